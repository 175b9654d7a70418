//! Window and keyboard handling for the player example

use std::{path::PathBuf, sync::Arc};

use vidgpu::{Effect, FrameSequencePlayer, MediaPlayer, PlaybackState, Session, SessionToken, Settings, SourceSelection, SurfaceRequest};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
    window::{Window, WindowId},
};

/// Percentage the arrow keys move the comparison split by
const SPLIT_STEP: f32 = 5.0;

pub struct PlayerApp {
    source: PathBuf,
    fps: u32,
    initial_settings: Settings,
    start_paused: bool,
    modifiers: ModifiersState,
    window: Option<Arc<Window>>,
    session: Option<Session<FrameSequencePlayer>>,
}

impl PlayerApp {
    pub fn new(source: PathBuf, fps: u32, initial_settings: Settings, start_paused: bool) -> Self {
        Self {
            source,
            fps,
            initial_settings,
            start_paused,
            modifiers: ModifiersState::default(),
            window: None,
            session: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let window = Arc::new(event_loop.create_window(Window::default_attributes().with_title("vidgpu player"))?);
        let size = window.inner_size();

        let request = SurfaceRequest::Window {
            target: wgpu::SurfaceTarget::from(window.clone()),
            size: (size.width, size.height),
        };
        let selection = SourceSelection::file(self.source.clone());
        let token = SessionToken::new();
        let mut session = pollster::block_on(Session::init(
            request,
            FrameSequencePlayer::new(self.fps),
            &selection,
            self.initial_settings.clone(),
            &token,
        ))?;
        if self.start_paused {
            session.pause()?;
        }

        self.window = Some(window);
        self.session = Some(session);
        self.fit_window();
        Ok(())
    }

    /// Sizes the window to the session's output
    fn fit_window(&self) {
        if let (Some(window), Some(session)) = (&self.window, &self.session) {
            if let Some((width, height)) = session.output_dimensions() {
                let _ = window.request_inner_size(PhysicalSize::new(width, height));
            }
        }
    }

    fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut settings = session.settings().clone();
        update(&mut settings);

        match session.apply_settings(settings) {
            Ok(change) if change.rebuild => self.fit_window(),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "failed to apply settings"),
        }
    }

    fn toggle_playback(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let playing = session.player().is_some_and(|player| player.state() == PlaybackState::Playing);
        let result = if playing { session.pause() } else { pollster::block_on(session.play()) };
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to toggle playback");
        }
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            tracing::error!(error = %e, "failed to start session");
            event_loop.exit();
            return;
        }

        println!();
        println!("Keyboard shortcuts:");
        println!("  - Esc: Quit");
        println!("  - Space: Pause/Resume playback");
        println!("  - Ctrl+0-9: Select effect");
        for (index, effect) in Effect::ALL.iter().take(10).enumerate() {
            println!("      {index}: {effect}");
        }
        println!("  - Tab: Cycle through all effects");
        println!("  - C: Toggle comparison");
        println!("  - Left/Right: Move comparison split");
        println!();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::ModifiersChanged(new_modifiers) => {
                self.modifiers = new_modifiers.state();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
                ..
            }
            | WindowEvent::CloseRequested => {
                if let Some(session) = self.session.as_mut() {
                    session.teardown();
                }
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(keycode),
                    ..
                },
                ..
            } if self.modifiers == ModifiersState::CONTROL => {
                let index = match keycode {
                    KeyCode::Digit0 => Some(0),
                    KeyCode::Digit1 => Some(1),
                    KeyCode::Digit2 => Some(2),
                    KeyCode::Digit3 => Some(3),
                    KeyCode::Digit4 => Some(4),
                    KeyCode::Digit5 => Some(5),
                    KeyCode::Digit6 => Some(6),
                    KeyCode::Digit7 => Some(7),
                    KeyCode::Digit8 => Some(8),
                    KeyCode::Digit9 => Some(9),
                    _ => None,
                };
                if let Some(effect) = index.and_then(|index| Effect::ALL.get(index)) {
                    self.update_settings(|settings| settings.effect = effect.name().to_string());
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(keycode),
                    ..
                },
                ..
            } => match keycode {
                KeyCode::Space => self.toggle_playback(),
                KeyCode::Tab => {
                    let current = self.session.as_ref().and_then(|session| session.effect()).unwrap_or_default();
                    let position = Effect::ALL.iter().position(|effect| *effect == current).unwrap_or(0);
                    let next = Effect::ALL[(position + 1) % Effect::ALL.len()];
                    self.update_settings(|settings| settings.effect = next.name().to_string());
                }
                KeyCode::KeyC => self.update_settings(|settings| settings.compare_on = !settings.compare_on),
                KeyCode::ArrowLeft => self.update_settings(|settings| settings.split_ratio = (settings.split_ratio - SPLIT_STEP).max(0.0)),
                KeyCode::ArrowRight => self.update_settings(|settings| settings.split_ratio = (settings.split_ratio + SPLIT_STEP).min(100.0)),
                _ => {}
            },

            WindowEvent::RedrawRequested => {
                if let Some(session) = self.session.as_mut() {
                    if let Err(e) = session.on_display_refresh() {
                        tracing::error!(error = %e, "session failed");
                        session.teardown();
                        event_loop.exit();
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}
