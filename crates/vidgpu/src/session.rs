//! Session lifecycle: initialization, settings changes, the per-refresh entry point and teardown
//!
//! A [`Session`] owns every GPU resource of one playback session. Settings changes are
//! applied synchronously between frame cycles; [`Session::teardown`] releases everything
//! in reverse dependency order and may be called any number of times.

use std::{cell::Cell, rc::Rc};

use vidgpu_effects::{Effect, EffectError};

use crate::{
    CaptureError, FrameError, FrameSourceError, SessionError,
    capture,
    compositor::{Compositor, RenderBindingSet},
    driver::{DriverState, FrameCycle, FrameDriver},
    frame_source::{FrameSource, MediaPlayer, SourceRef, SourceSelection},
    ingest::{FrameIngestor, VideoFrameTexture},
    registry::{ActivePipeline, EffectRegistry},
    settings::{Settings, SettingsChange, SettingsInbox},
    surface::{DeviceContext, SurfaceRequest},
};

/// Cancellation flag shared between a pending [`Session::init`] and its owner
///
/// Cancelling makes the init discard and release whatever it acquired at its next step.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    cancelled: Rc<Cell<bool>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// GPU state touched by every frame cycle
struct GpuState {
    context: DeviceContext,
    video_texture: VideoFrameTexture,
    ingestor: FrameIngestor,
    registry: EffectRegistry,
    active: ActivePipeline,
    compositor: Compositor,
    bindings: RenderBindingSet,
    frame_index: u64,
}

impl GpuState {
    /// Swaps in a freshly built pipeline, rebinds the compositor and resizes the target
    ///
    /// The previous pipeline stays live until the new one has been built.
    fn rebuild_pipeline(&mut self, settings: &Settings, target: (u32, u32)) -> Result<(), EffectError> {
        let active = self.registry.build(
            self.context.device(),
            &settings.effect,
            self.video_texture.texture(),
            target,
            &settings.effect_params(),
        )?;
        let previous = std::mem::replace(&mut self.active, active);
        self.bindings = self
            .compositor
            .rebind(self.context.device(), self.active.output_texture(), self.video_texture.texture(), self.active.generation());
        previous.release();
        self.context.resize(self.active.output_dimensions());
        Ok(())
    }

    /// Replaces the video texture with one of `size` and rebuilds everything that reads it
    fn recreate_video_texture(&mut self, settings: &Settings, size: (u32, u32)) -> Result<(), EffectError> {
        let previous = std::mem::replace(&mut self.video_texture, VideoFrameTexture::new(self.context.device(), size));
        match self.rebuild_pipeline(settings, size) {
            Ok(()) => {
                previous.destroy();
                Ok(())
            }
            Err(e) => {
                std::mem::replace(&mut self.video_texture, previous).destroy();
                Err(e)
            }
        }
    }

    fn release(mut self) {
        self.active.release();
        self.video_texture.destroy();
        drop(self.bindings);
        self.compositor.release();
        self.context.release();
    }
}

impl<P: MediaPlayer> FrameCycle<P> for GpuState {
    fn run_cycle(&mut self, source: &mut FrameSource<P>) -> Result<(), FrameError> {
        self.ingestor.ingest(source, &self.video_texture, self.context.queue())?;

        let frame = self.context.acquire_frame()?;
        let view = frame.view(self.context.format());

        self.frame_index += 1;
        let mut encoder = self
            .context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame Encoder") });
        self.active.execute(&mut encoder, self.frame_index);
        self.compositor.draw(&mut encoder, &self.bindings, &view);
        self.context.queue().submit(Some(encoder.finish()));
        self.context.present(frame);
        Ok(())
    }
}

struct Live<P: MediaPlayer> {
    source: FrameSource<P>,
    driver: FrameDriver,
    gpu: GpuState,
}

impl<P: MediaPlayer> Live<P> {
    /// Loads `source_ref` and rebuilds everything sized from the video
    async fn reload(&mut self, source_ref: &SourceRef<P::File>, settings: &Settings) -> Result<(), SessionError> {
        self.source.replace(source_ref)?;
        start_playback(&mut self.source).await?;

        let size = self.source.current_dimensions();
        if size != self.gpu.video_texture.size() {
            self.gpu.recreate_video_texture(settings, size)?;
        } else {
            self.gpu.rebuild_pipeline(settings, size)?;
        }
        Ok(())
    }
}

/// One playback session: device, source, active pipeline, compositor and frame driver
pub struct Session<P: MediaPlayer> {
    live: Option<Live<P>>,
    settings: Settings,
    inbox: SettingsInbox,
}

/// Awaits the first play; a rejected autoplay leaves the source paused instead of failing
async fn start_playback<P: MediaPlayer>(source: &mut FrameSource<P>) -> Result<(), FrameSourceError> {
    match source.start_playback().await {
        Err(FrameSourceError::PlaybackRejected(reason)) => {
            tracing::warn!(%reason, "autoplay rejected, source stays paused");
            Ok(())
        }
        result => result,
    }
}

impl<P: MediaPlayer> Session<P> {
    /// Acquires the device, opens the source, builds the initial pipeline and starts the driver
    ///
    /// The source selection is validated before any GPU work. If `token` is cancelled while
    /// a step is pending, everything acquired so far is released and
    /// [`SessionError::Cancelled`] is returned.
    pub async fn init(
        request: SurfaceRequest,
        player: P,
        selection: &SourceSelection<P::File>,
        settings: Settings,
        token: &SessionToken,
    ) -> Result<Self, SessionError> {
        let source_ref = selection.to_source().inspect_err(|_| tracing::error!("no video source provided"))?;

        let mut context = DeviceContext::acquire(request).await.inspect_err(|e| tracing::error!(error = %e, "GPU initialization failed"))?;
        if token.is_cancelled() {
            context.release();
            return Err(SessionError::Cancelled);
        }

        let mut source = match FrameSource::open(player, &source_ref, settings.request_frame) {
            Ok(source) => source,
            Err(e) => {
                context.release();
                return Err(e.into());
            }
        };

        let playback = start_playback(&mut source).await;
        if let Err(e) = playback {
            source.close();
            context.release();
            return Err(e.into());
        }
        if token.is_cancelled() {
            source.close();
            context.release();
            return Err(SessionError::Cancelled);
        }

        let size = source.current_dimensions();
        let video_texture = VideoFrameTexture::new(context.device(), size);
        let mut registry = EffectRegistry::default();
        let active = match registry.build(context.device(), &settings.effect, video_texture.texture(), size, &settings.effect_params()) {
            Ok(active) => active,
            Err(e) => {
                video_texture.destroy();
                source.close();
                context.release();
                return Err(e.into());
            }
        };

        let compositor = Compositor::configure(context.device(), context.format(), settings.compare_on, settings.split_fraction());
        let bindings = compositor.rebind(context.device(), active.output_texture(), video_texture.texture(), active.generation());
        context.resize(active.output_dimensions());

        let mut gpu = GpuState {
            context,
            video_texture,
            ingestor: FrameIngestor::default(),
            registry,
            active,
            compositor,
            bindings,
            frame_index: 0,
        };

        let mut driver = FrameDriver::new();
        driver.start(&mut source);
        gpu.ingestor.request_forced_copy();
        driver.render_immediate(&mut source, &mut gpu);

        tracing::info!(effect = %gpu.active.effect(), video = ?size, output = ?gpu.context.size(), "session initialized");

        Ok(Self {
            live: Some(Live { source, driver, gpu }),
            settings,
            inbox: SettingsInbox::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A handle for submitting settings from UI callbacks; drained on the next refresh
    pub fn settings_inbox(&self) -> SettingsInbox {
        self.inbox.clone()
    }

    /// Applies new settings between frame cycles
    ///
    /// An effect change or comparison toggle rebuilds the pipeline and its bindings and
    /// resizes the output; split and coefficient changes are in-place uniform writes.
    /// Any visible change renders one frame immediately, even while paused.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<SettingsChange, SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::TornDown)?;
        let change = SettingsChange::between(&self.settings, &settings);
        if change.is_empty() {
            return Ok(change);
        }
        tracing::debug!(?change, effect = %settings.effect, "applying settings");

        if change.rebuild {
            let target = live.gpu.context.size();
            live.gpu.rebuild_pipeline(&settings, target)?;
        } else if change.params {
            live.gpu.active.write_params(live.gpu.context.queue(), &settings.effect_params());
        }
        if change.comparison {
            live.gpu
                .compositor
                .write_comparison(live.gpu.context.queue(), settings.compare_on, settings.split_fraction());
        }
        if change.frame_request {
            live.source.set_mode(settings.request_frame);
        }
        self.settings = settings;

        if change.needs_immediate_frame() {
            live.gpu.ingestor.request_forced_copy();
            live.driver.render_immediate(&mut live.source, &mut live.gpu);
        }
        Ok(change)
    }

    /// Entry point for every display refresh
    ///
    /// Rebuilds once if the source has just reported its real dimensions, drains pending
    /// settings, then runs a frame cycle if the source notification fired. Returns whether
    /// a notification-driven cycle ran.
    pub fn on_display_refresh(&mut self) -> Result<bool, SessionError> {
        let settings = &self.settings;
        let Some(live) = self.live.as_mut() else {
            return Ok(false);
        };

        if live.source.has_real_dimensions() {
            let size = live.source.current_dimensions();
            if size != live.gpu.video_texture.size() {
                tracing::info!(width = size.0, height = size.1, "source dimensions changed, rebuilding");
                live.gpu.recreate_video_texture(settings, size)?;
                // The rebuilt target is blank until drawn, and a paused source never notifies
                live.gpu.ingestor.request_forced_copy();
                live.driver.render_immediate(&mut live.source, &mut live.gpu);
            }
        }

        if let Some(settings) = self.inbox.take() {
            self.apply_settings(settings)?;
        }

        let live = self.live.as_mut().ok_or(SessionError::TornDown)?;
        Ok(live.driver.dispatch(&mut live.source, &mut live.gpu))
    }

    /// Switches to a different source without recreating the device or compositor
    ///
    /// The frame driver is restarted whether or not the new source could be loaded.
    pub async fn replace_source(&mut self, selection: &SourceSelection<P::File>) -> Result<(), SessionError> {
        let source_ref = selection.to_source()?;
        let settings = &self.settings;
        let live = self.live.as_mut().ok_or(SessionError::TornDown)?;

        live.driver.stop(&mut live.source);
        let result = live.reload(&source_ref, settings).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "source replacement failed, keeping the session running");
        }

        live.driver = FrameDriver::new();
        live.driver.start(&mut live.source);
        live.gpu.ingestor.request_forced_copy();
        live.driver.render_immediate(&mut live.source, &mut live.gpu);
        result
    }

    pub async fn play(&mut self) -> Result<(), SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::TornDown)?;
        live.source.start_playback().await?;
        tracing::info!("playback resumed");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::TornDown)?;
        live.source.pause();
        tracing::info!("playback paused");
        Ok(())
    }

    /// Stops the driver and releases every resource; safe to call repeatedly
    pub fn teardown(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        live.driver.stop(&mut live.source);
        live.gpu.release();
        live.source.close();
        tracing::info!("session torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.live.is_none()
    }

    /// Reads the last composited frame back, for offscreen sessions
    pub async fn capture_frame(&self) -> Result<image::RgbaImage, CaptureError> {
        let live = self.live.as_ref().ok_or(CaptureError::TornDown)?;
        let texture = live.gpu.context.offscreen_texture().ok_or(CaptureError::NoFrame)?;
        capture::read_texture_rgba8(live.gpu.context.device(), live.gpu.context.queue(), texture).await
    }

    pub fn effect(&self) -> Option<Effect> {
        self.live.as_ref().map(|live| live.gpu.active.effect())
    }

    /// Size of the active pipeline output, which is also the render target size
    pub fn output_dimensions(&self) -> Option<(u32, u32)> {
        self.live.as_ref().map(|live| live.gpu.active.output_dimensions())
    }

    pub fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.live.as_ref().map(|live| live.gpu.video_texture.size())
    }

    pub fn target_dimensions(&self) -> Option<(u32, u32)> {
        self.live.as_ref().map(|live| live.gpu.context.size())
    }

    /// Generation of the active pipeline
    pub fn pipeline_generation(&self) -> Option<u64> {
        self.live.as_ref().map(|live| live.gpu.active.generation())
    }

    /// Generation of the pipeline the compositor bindings were built for
    pub fn bindings_generation(&self) -> Option<u64> {
        self.live.as_ref().map(|live| live.gpu.bindings.generation())
    }

    pub fn driver_state(&self) -> DriverState {
        self.live.as_ref().map_or(DriverState::Stopped, |live| live.driver.state())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.live.as_ref().map_or(0, |live| live.driver.frames_rendered())
    }

    pub fn frames_skipped(&self) -> u64 {
        self.live.as_ref().map_or(0, |live| live.driver.frames_skipped())
    }

    pub fn has_registered_notification(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.source.has_registered_notification())
    }

    pub fn player(&self) -> Option<&P> {
        self.live.as_ref().map(|live| live.source.player())
    }

    pub fn player_mut(&mut self) -> Option<&mut P> {
        self.live.as_mut().map(|live| live.source.player_mut())
    }
}

impl<P: MediaPlayer> Drop for Session<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FALLBACK_DIMENSIONS, test_support::ScriptedPlayer};

    fn init_scripted(player: ScriptedPlayer) -> Option<Session<ScriptedPlayer>> {
        let result = pollster::block_on(Session::init(
            SurfaceRequest::Offscreen { size: (64, 36) },
            player,
            &SourceSelection::url("https://example.com/video.mp4"),
            Settings::default(),
            &SessionToken::new(),
        ));
        match result {
            Ok(session) => Some(session),
            Err(SessionError::AdapterUnavailable(_) | SessionError::MissingFeatures(_) | SessionError::DeviceUnavailable(_)) => {
                eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
                None
            }
            Err(e) => panic!("session init failed: {e}"),
        }
    }

    fn copies(session: &Session<ScriptedPlayer>) -> usize {
        session.player().map_or(0, |player| player.copies)
    }

    #[test]
    fn settings_change_renders_while_paused() {
        let Some(mut session) = init_scripted(ScriptedPlayer::new(Some((64, 36)))) else {
            return;
        };
        assert_eq!(copies(&session), 1);
        session.pause().unwrap();
        let rendered = session.frames_rendered();

        assert!(!session.on_display_refresh().unwrap());
        assert_eq!(copies(&session), 1);

        session
            .apply_settings(Settings {
                compare_on: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.frames_rendered(), rendered + 1);
        assert_eq!(copies(&session), 2);
        assert_eq!(session.frames_skipped(), 0);
    }

    #[test]
    fn late_dimensions_rebuild_before_pending_settings() {
        let Some(mut session) = init_scripted(ScriptedPlayer::new(None)) else {
            return;
        };
        assert_eq!(session.video_dimensions(), Some(FALLBACK_DIMENSIONS));
        session.pause().unwrap();
        let rendered = session.frames_rendered();
        let copied = copies(&session);

        if let Some(player) = session.player_mut() {
            player.dimensions = Some((640, 360));
        }
        session.settings_inbox().submit(Settings {
            effect: "Mode A".to_string(),
            ..Default::default()
        });
        assert!(!session.on_display_refresh().unwrap());

        assert_eq!(session.video_dimensions(), Some((640, 360)));
        assert_eq!(session.effect(), Some(Effect::ModeA));
        assert_eq!(session.bindings_generation(), session.pipeline_generation());
        assert_eq!(session.frames_skipped(), 0);
        // One frame for the rebuilt texture, one for the effect change
        assert_eq!(session.frames_rendered(), rendered + 2);
        assert_eq!(copies(&session), copied + 2);
    }

    #[test]
    fn late_dimensions_render_without_pending_settings() {
        let Some(mut session) = init_scripted(ScriptedPlayer::new(None)) else {
            return;
        };
        session.pause().unwrap();
        let rendered = session.frames_rendered();

        if let Some(player) = session.player_mut() {
            player.dimensions = Some((320, 180));
        }
        session.on_display_refresh().unwrap();
        assert_eq!(session.video_dimensions(), Some((320, 180)));
        assert_eq!(session.output_dimensions(), Some((320, 180)));
        assert_eq!(session.frames_rendered(), rendered + 1);

        session.on_display_refresh().unwrap();
        assert_eq!(session.frames_rendered(), rendered + 1);
    }

    #[test]
    fn frame_request_change_reaches_the_source() {
        let Some(mut session) = init_scripted(ScriptedPlayer::new(Some((64, 36)))) else {
            return;
        };
        let change = session
            .apply_settings(Settings {
                request_frame: crate::FrameRequestMode::AnimationFrame,
                ..Default::default()
            })
            .unwrap();
        assert!(change.frame_request);
        assert_eq!(session.settings().request_frame, crate::FrameRequestMode::AnimationFrame);
        assert!(session.on_display_refresh().unwrap());
    }

    #[test]
    fn token_cancellation_is_shared() {
        let token = SessionToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
