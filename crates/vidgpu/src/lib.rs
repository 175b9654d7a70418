//! Real-time GPU enhancement of decoded video frames
//!
//! A [`Session`] ties together a GPU device and presentation target, a [`MediaPlayer`]
//! wrapped in a [`FrameSource`], the active effect pipeline and a compositor that can
//! split the output against the unprocessed frame. On every display refresh the host calls
//! [`Session::on_display_refresh`]; the session ingests the newest decoded frame, runs the
//! effect and presents the result.
//!
//! Browsers drive the session from `requestAnimationFrame` with an HTML video element as the
//! player. Native hosts can use [`FrameSequencePlayer`] and either a window surface or an
//! offscreen target read back with [`Session::capture_frame`].

mod capture;
mod compositor;
mod driver;
mod error;
mod frame_source;
mod ingest;
mod registry;
#[cfg(native)]
mod sequence_player;
mod session;
mod settings;
mod surface;
#[cfg(test)]
mod test_support;

pub use capture::read_texture_rgba8;
pub use compositor::{ComparisonSource, Compositor, RenderBindingSet, SPLIT_EPSILON, comparison_source};
pub use driver::{DriverState, FrameCycle, FrameDriver};
pub use error::{CaptureError, FrameError, FrameSourceError, SessionError};
pub use frame_source::{FALLBACK_DIMENSIONS, FrameSource, MediaPlayer, PlaybackState, SourceRef, SourceSelection};
pub use ingest::{FrameIngestor, VIDEO_FRAME_FORMAT, VideoFrameTexture, rgba8_to_f16, write_rgba8_frame};
pub use registry::{ActivePipeline, EffectRegistry};
#[cfg(native)]
pub use sequence_player::{FrameSequencePlayer, PlaybackClock};
pub use session::{Session, SessionToken};
pub use settings::{FrameRequestMode, Settings, SettingsChange, SettingsInbox};
pub use surface::{DeviceContext, OFFSCREEN_FORMAT, SurfaceRequest, TargetFrame};

pub use vidgpu_effects::{Effect, EffectParams};
