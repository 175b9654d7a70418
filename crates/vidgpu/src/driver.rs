//! The frame loop: one ingest, execute and composite cycle per source notification

use crate::{
    FrameError,
    frame_source::{FrameSource, MediaPlayer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// Terminal; a stopped driver never runs another cycle
    Stopped,
}

/// One ingest, execute and composite cycle
pub trait FrameCycle<P: MediaPlayer> {
    fn run_cycle(&mut self, source: &mut FrameSource<P>) -> Result<(), FrameError>;
}

#[derive(Debug)]
pub struct FrameDriver {
    state: DriverState,
    frames_rendered: u64,
    frames_skipped: u64,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            state: DriverState::Idle,
            frames_rendered: 0,
            frames_skipped: 0,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Registers for the source's notification; only an idle driver can start
    pub fn start<P: MediaPlayer>(&mut self, source: &mut FrameSource<P>) {
        match self.state {
            DriverState::Idle => {
                source.request_notification();
                self.state = DriverState::Running;
                tracing::info!("frame driver started");
            }
            DriverState::Running => {}
            DriverState::Stopped => tracing::warn!("ignoring start of a stopped frame driver"),
        }
    }

    /// Unregisters from the source; idempotent and legal from any state
    pub fn stop<P: MediaPlayer>(&mut self, source: &mut FrameSource<P>) {
        source.cancel_notification();
        if self.state != DriverState::Stopped {
            self.state = DriverState::Stopped;
            tracing::info!(rendered = self.frames_rendered, skipped = self.frames_skipped, "frame driver stopped");
        }
    }

    /// Runs one cycle if the source notification has fired, then re-registers
    ///
    /// A failing cycle is logged and skipped; the driver keeps running.
    pub fn dispatch<P: MediaPlayer, C: FrameCycle<P>>(&mut self, source: &mut FrameSource<P>, cycle: &mut C) -> bool {
        if self.state != DriverState::Running || !source.poll_notification() {
            return false;
        }
        self.run(source, cycle);
        source.request_notification();
        true
    }

    /// Runs one cycle right away, independent of the notification
    pub fn render_immediate<P: MediaPlayer, C: FrameCycle<P>>(&mut self, source: &mut FrameSource<P>, cycle: &mut C) -> bool {
        if self.state == DriverState::Stopped {
            return false;
        }
        self.run(source, cycle)
    }

    fn run<P: MediaPlayer, C: FrameCycle<P>>(&mut self, source: &mut FrameSource<P>, cycle: &mut C) -> bool {
        match cycle.run_cycle(source) {
            Ok(()) => {
                self.frames_rendered += 1;
                true
            }
            Err(e) => {
                self.frames_skipped += 1;
                tracing::warn!(error = %e, "skipping frame");
                false
            }
        }
    }
}
