//! GPU image-enhancement effects for video frames
//!
//! This crate provides the effect pipelines a video session can select: deblur,
//! denoise, restore, 2x upscale and composite "mode" chains. A caller only needs
//! an [`Effect`], an input texture and [`EffectPipeline`]'s three operations:
//! record the passes, read the output texture, and query the output dimensions.

mod effects;
mod error;
pub(crate) mod executable_pipeline;
mod pipeline_executor;

pub mod pipelines;

pub use effects::{Effect, PresetDimensions, ResourceRequirements};
pub use error::EffectError;
pub use executable_pipeline::{EffectParams, ExecutablePipeline};
pub use pipeline_executor::PipelineExecutor;

/// A GPU program bound to an input texture
pub trait EffectPipeline {
    /// Records this pipeline's passes into `encoder`
    fn execute(&self, encoder: &mut wgpu::CommandEncoder);

    /// Texture holding the result once the recorded passes have run
    fn output_texture(&self) -> &wgpu::Texture;

    fn output_dimensions(&self) -> (u32, u32) {
        let texture = self.output_texture();
        (texture.width(), texture.height())
    }
}

/// Identity pipeline: the output is the input texture itself
#[derive(Debug)]
pub struct Passthrough {
    input_texture: wgpu::Texture,
}

impl EffectPipeline for Passthrough {
    fn execute(&self, _encoder: &mut wgpu::CommandEncoder) {}

    fn output_texture(&self) -> &wgpu::Texture {
        &self.input_texture
    }
}

impl EffectPipeline for PipelineExecutor {
    fn execute(&self, encoder: &mut wgpu::CommandEncoder) {
        self.pass(encoder);
    }

    fn output_texture(&self) -> &wgpu::Texture {
        PipelineExecutor::output_texture(self)
    }
}

/// A built effect, either the identity or a bound chain of compute passes
#[derive(Debug)]
pub enum BuiltPipeline {
    Passthrough(Passthrough),
    Executor(PipelineExecutor),
}

impl BuiltPipeline {
    pub fn passthrough(input_texture: &wgpu::Texture) -> Self {
        BuiltPipeline::Passthrough(Passthrough {
            input_texture: input_texture.clone(),
        })
    }

    /// Rewrites the tunable parameters of every pass in place
    pub fn write_params(&self, queue: &wgpu::Queue, params: &EffectParams) {
        if let BuiltPipeline::Executor(executor) = self {
            executor.write_params(queue, params);
        }
    }

    /// Destroys the resources owned by this pipeline; the input texture is left alone
    pub fn release(self) {
        if let BuiltPipeline::Executor(executor) = self {
            executor.release();
        }
    }
}

impl EffectPipeline for BuiltPipeline {
    fn execute(&self, encoder: &mut wgpu::CommandEncoder) {
        match self {
            BuiltPipeline::Passthrough(pipeline) => pipeline.execute(encoder),
            BuiltPipeline::Executor(pipeline) => pipeline.execute(encoder),
        }
    }

    fn output_texture(&self) -> &wgpu::Texture {
        match self {
            BuiltPipeline::Passthrough(pipeline) => pipeline.output_texture(),
            BuiltPipeline::Executor(pipeline) => EffectPipeline::output_texture(pipeline),
        }
    }
}
