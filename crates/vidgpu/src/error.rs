//! Error types for sessions, frame sources, individual frames and readback

use thiserror::Error;

/// Errors that end a session or prevent one from starting
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),
    #[error("adapter is missing required features: {0:?}")]
    MissingFeatures(wgpu::Features),
    #[error("failed to create GPU device: {0}")]
    DeviceUnavailable(#[from] wgpu::RequestDeviceError),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface is not compatible with the selected adapter")]
    IncompatibleSurface,
    #[error("no video source provided")]
    NoSource,
    #[error("failed to decode video source: {0}")]
    Decode(String),
    #[error("session was cancelled during initialization")]
    Cancelled,
    #[error("session has been torn down")]
    TornDown,
    #[error(transparent)]
    Effect(#[from] vidgpu_effects::EffectError),
}

impl From<FrameSourceError> for SessionError {
    fn from(e: FrameSourceError) -> Self {
        match e {
            FrameSourceError::NoSource => SessionError::NoSource,
            other => SessionError::Decode(other.to_string()),
        }
    }
}

/// Errors raised while opening or playing a video source
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("no video source provided")]
    NoSource,
    #[error("{0}")]
    Decode(String),
    #[error("playback was rejected: {0}")]
    PlaybackRejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors confined to a single frame; the driver skips the frame and carries on
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("source is {source_size:?} but the video texture is {texture_size:?}")]
    DimensionMismatch { source_size: (u32, u32), texture_size: (u32, u32) },
    #[error("failed to ingest frame: {0}")]
    Ingest(String),
}

/// Errors raised while reading a rendered frame back to the CPU
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no frame has been rendered to an offscreen target")]
    NoFrame,
    #[error("unsupported texture format for capture: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("failed to poll device: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("readback channel closed before the buffer was mapped")]
    ChannelClosed,
    #[error("session has been torn down")]
    TornDown,
}
