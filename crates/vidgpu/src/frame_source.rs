//! Video sources and the per-frame notification contract
//!
//! A [`MediaPlayer`] is the platform's decoder: an HTML video element in the browser,
//! or a [`FrameSequencePlayer`](crate::FrameSequencePlayer) natively. [`FrameSource`]
//! wraps one and adds what the session needs on top: the dimension fallback and a
//! one-shot notification that is re-armed after every frame cycle.

use std::future::Future;

use crate::{FrameError, FrameSourceError, settings::FrameRequestMode};

/// Dimensions assumed until the player reports real ones
pub const FALLBACK_DIMENSIONS: (u32, u32) = (1280, 720);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
}

/// A reference to the media a player should load
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRef<F> {
    Url(String),
    File(F),
}

/// The user's current source choice; choosing one kind clears the other
#[derive(Debug, Clone)]
pub struct SourceSelection<F> {
    url: Option<String>,
    file: Option<F>,
}

impl<F> Default for SourceSelection<F> {
    fn default() -> Self {
        Self { url: None, file: None }
    }
}

impl<F: Clone> SourceSelection<F> {
    pub fn url(url: impl Into<String>) -> Self {
        let mut selection = Self::default();
        selection.select_url(url);
        selection
    }

    pub fn file(file: F) -> Self {
        let mut selection = Self::default();
        selection.select_file(file);
        selection
    }

    pub fn select_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
        self.file = None;
    }

    pub fn select_file(&mut self, file: F) {
        self.file = Some(file);
        self.url = None;
    }

    pub fn selected_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn selected_file(&self) -> Option<&F> {
        self.file.as_ref()
    }

    /// Resolves the selection; an empty URL counts as no selection
    pub fn to_source(&self) -> Result<SourceRef<F>, FrameSourceError> {
        match (&self.url, &self.file) {
            (Some(url), _) if !url.is_empty() => Ok(SourceRef::Url(url.clone())),
            (_, Some(file)) => Ok(SourceRef::File(file.clone())),
            _ => Err(FrameSourceError::NoSource),
        }
    }
}

/// A platform video decoder
pub trait MediaPlayer {
    /// Local file handle type accepted by [`MediaPlayer::load`]
    type File: Clone;

    fn load(&mut self, source: &SourceRef<Self::File>) -> Result<(), FrameSourceError>;

    fn set_muted(&mut self, muted: bool);

    fn set_looping(&mut self, looping: bool);

    /// Starts or resumes playback, resolving once playback has begun
    fn play(&mut self) -> impl Future<Output = Result<(), FrameSourceError>>;

    fn pause(&mut self);

    fn state(&self) -> PlaybackState;

    /// Decoded frame size, or `None` while unknown
    fn video_dimensions(&self) -> Option<(u32, u32)>;

    /// Number of distinct decoded frames presented so far
    ///
    /// Must not decrease, except that [`MediaPlayer::load`] resets it.
    fn presented_frames(&mut self) -> u64;

    /// Copies the current decoded frame into an `Rgba16Float` texture of matching size
    fn copy_current_frame(&mut self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<(), FrameError>;

    /// Stops playback and releases the loaded media
    fn close(&mut self);
}

/// A loaded player plus the notification state the frame driver relies on
#[derive(Debug)]
pub struct FrameSource<P: MediaPlayer> {
    player: P,
    mode: FrameRequestMode,
    registered: bool,
    last_presented: u64,
    warned_fallback: bool,
    closed: bool,
}

impl<P: MediaPlayer> FrameSource<P> {
    /// Loads `source` into `player`, configured muted and looping
    pub fn open(mut player: P, source: &SourceRef<P::File>, mode: FrameRequestMode) -> Result<Self, FrameSourceError> {
        player.set_muted(true);
        player.set_looping(true);
        player.load(source)?;
        tracing::info!(source = describe(source), "video source opened");

        Ok(Self {
            player,
            mode,
            registered: false,
            last_presented: 0,
            warned_fallback: false,
            closed: false,
        })
    }

    /// Loads a different source into the same player
    pub fn replace(&mut self, source: &SourceRef<P::File>) -> Result<(), FrameSourceError> {
        self.player.pause();
        self.player.load(source)?;
        self.last_presented = 0;
        self.warned_fallback = false;
        self.closed = false;
        tracing::info!(source = describe(source), "video source replaced");
        Ok(())
    }

    pub async fn start_playback(&mut self) -> Result<(), FrameSourceError> {
        self.player.play().await
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn is_playing(&self) -> bool {
        self.player.state() == PlaybackState::Playing
    }

    pub fn has_real_dimensions(&self) -> bool {
        matches!(self.player.video_dimensions(), Some((width, height)) if width > 0 && height > 0)
    }

    /// Decoded dimensions, or [`FALLBACK_DIMENSIONS`] while the player has not reported any
    pub fn current_dimensions(&mut self) -> (u32, u32) {
        match self.player.video_dimensions() {
            Some((width, height)) if width > 0 && height > 0 => (width, height),
            _ => {
                if !self.warned_fallback {
                    tracing::warn!(
                        width = FALLBACK_DIMENSIONS.0,
                        height = FALLBACK_DIMENSIONS.1,
                        "video dimensions unavailable, using fallback"
                    );
                    self.warned_fallback = true;
                }
                FALLBACK_DIMENSIONS
            }
        }
    }

    pub fn mode(&self) -> FrameRequestMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FrameRequestMode) {
        self.mode = mode;
    }

    /// Arms the one-shot notification
    pub fn request_notification(&mut self) {
        self.registered = true;
    }

    pub fn cancel_notification(&mut self) {
        self.registered = false;
    }

    pub fn has_registered_notification(&self) -> bool {
        self.registered
    }

    /// Called on each display refresh; returns true when the armed notification fires
    ///
    /// In [`FrameRequestMode::VideoFrameCallback`] mode it fires only when the player has
    /// presented a frame not seen by a previous notification. Firing disarms it.
    pub fn poll_notification(&mut self) -> bool {
        if !self.registered {
            return false;
        }

        let presented = self.player.presented_frames();
        let fire = match self.mode {
            FrameRequestMode::AnimationFrame => true,
            FrameRequestMode::VideoFrameCallback => presented > self.last_presented,
        };

        if fire {
            self.last_presented = presented;
            self.registered = false;
        }
        fire
    }

    pub fn copy_frame_into(&mut self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<(), FrameError> {
        self.player.copy_current_frame(queue, texture)
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Cancels the notification and closes the player; safe to call more than once
    pub fn close(&mut self) {
        self.registered = false;
        if !self.closed {
            self.player.close();
            self.closed = true;
            tracing::info!("video source closed");
        }
    }
}

fn describe<F>(source: &SourceRef<F>) -> &str {
    match source {
        SourceRef::Url(url) => url,
        SourceRef::File(_) => "<local file>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedPlayer;

    fn open(player: ScriptedPlayer, mode: FrameRequestMode) -> FrameSource<ScriptedPlayer> {
        FrameSource::open(player, &SourceRef::Url("https://example.com/video.mp4".to_string()), mode).unwrap()
    }

    #[test]
    fn selecting_one_kind_clears_the_other() {
        let mut selection = SourceSelection::url("https://example.com/a.mp4");
        selection.select_file(7u32);
        assert_eq!(selection.selected_url(), None);
        assert_eq!(selection.to_source().unwrap(), SourceRef::File(7));

        selection.select_url("https://example.com/b.mp4");
        assert_eq!(selection.selected_file(), None);
        assert_eq!(selection.to_source().unwrap(), SourceRef::Url("https://example.com/b.mp4".to_string()));
    }

    #[test]
    fn empty_selection_has_no_source() {
        assert!(matches!(SourceSelection::<u32>::default().to_source(), Err(FrameSourceError::NoSource)));
        assert!(matches!(SourceSelection::<u32>::url("").to_source(), Err(FrameSourceError::NoSource)));
    }

    #[test]
    fn opens_muted_and_looping() {
        let source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::VideoFrameCallback);
        assert!(source.player().muted);
        assert!(source.player().looping);
        assert_eq!(source.player().loads, 1);
    }

    #[test]
    fn falls_back_to_default_dimensions() {
        let mut source = open(ScriptedPlayer::new(None), FrameRequestMode::VideoFrameCallback);
        assert!(!source.has_real_dimensions());
        assert_eq!(source.current_dimensions(), FALLBACK_DIMENSIONS);

        source.player_mut().dimensions = Some((640, 360));
        assert!(source.has_real_dimensions());
        assert_eq!(source.current_dimensions(), (640, 360));
    }

    #[test]
    fn unregistered_notification_never_fires() {
        let mut source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::AnimationFrame);
        assert!(!source.poll_notification());
    }

    #[test]
    fn video_frame_mode_fires_once_per_presented_frame() {
        let mut source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::VideoFrameCallback);
        source.request_notification();
        assert!(!source.poll_notification(), "nothing presented yet");

        source.player_mut().presented = 1;
        assert!(source.poll_notification());
        assert!(!source.has_registered_notification());

        source.request_notification();
        assert!(!source.poll_notification(), "same frame must not fire twice");
        assert!(source.has_registered_notification());

        source.player_mut().presented = 3;
        assert!(source.poll_notification());
    }

    #[test]
    fn animation_frame_mode_fires_on_every_refresh() {
        let mut source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::AnimationFrame);
        for _ in 0..3 {
            source.request_notification();
            assert!(source.poll_notification());
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mut source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::VideoFrameCallback);
        source.request_notification();
        source.close();
        source.close();
        assert_eq!(source.player().closes, 1);
        assert!(!source.has_registered_notification());
    }

    #[test]
    fn replace_resets_frame_tracking() {
        let mut source = open(ScriptedPlayer::new(Some((64, 32))), FrameRequestMode::VideoFrameCallback);
        source.player_mut().presented = 5;
        source.request_notification();
        assert!(source.poll_notification());

        source.replace(&SourceRef::File(1)).unwrap();
        source.player_mut().presented = 1;
        source.request_notification();
        assert!(source.poll_notification());
        assert_eq!(source.player().loads, 2);
    }
}
