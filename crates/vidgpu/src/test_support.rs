use std::future::Future;

use crate::{
    FrameError, FrameSourceError,
    frame_source::{MediaPlayer, PlaybackState, SourceRef},
};

/// A player whose every observable is set directly by the test
#[derive(Debug)]
pub struct ScriptedPlayer {
    pub dimensions: Option<(u32, u32)>,
    pub state: PlaybackState,
    pub presented: u64,
    pub muted: bool,
    pub looping: bool,
    pub loads: usize,
    pub closes: usize,
    pub copies: usize,
}

impl ScriptedPlayer {
    pub fn new(dimensions: Option<(u32, u32)>) -> Self {
        Self {
            dimensions,
            state: PlaybackState::Paused,
            presented: 0,
            muted: false,
            looping: false,
            loads: 0,
            closes: 0,
            copies: 0,
        }
    }
}

impl MediaPlayer for ScriptedPlayer {
    type File = u32;

    fn load(&mut self, _source: &SourceRef<u32>) -> Result<(), FrameSourceError> {
        self.loads += 1;
        self.presented = 0;
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn play(&mut self) -> impl Future<Output = Result<(), FrameSourceError>> {
        self.state = PlaybackState::Playing;
        std::future::ready(Ok(()))
    }

    fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn presented_frames(&mut self) -> u64 {
        self.presented
    }

    fn copy_current_frame(&mut self, _queue: &wgpu::Queue, _texture: &wgpu::Texture) -> Result<(), FrameError> {
        self.copies += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// A device for tests that touch the GPU, or `None` when the machine has no usable adapter
pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())).ok()?;
    if !adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE) {
        return None;
    }
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: wgpu::Features::FLOAT32_FILTERABLE,
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: Default::default(),
    }))
    .ok()
}
