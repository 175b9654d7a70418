//! Resolving effect identifiers into live pipelines

use vidgpu_effects::{BuiltPipeline, Effect, EffectError, EffectParams, EffectPipeline, PresetDimensions};

/// The one pipeline a session currently runs
///
/// Each build gets a fresh generation number, which the compositor uses to tell whether
/// its bindings still refer to this pipeline's output.
#[derive(Debug)]
pub struct ActivePipeline {
    effect: Effect,
    generation: u64,
    pipeline: BuiltPipeline,
    last_executed_frame: Option<u64>,
}

impl ActivePipeline {
    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn output_texture(&self) -> &wgpu::Texture {
        self.pipeline.output_texture()
    }

    pub fn output_dimensions(&self) -> (u32, u32) {
        self.pipeline.output_dimensions()
    }

    /// Records the pipeline passes for `frame_index`; a second call for the same frame is ignored
    pub fn execute(&mut self, encoder: &mut wgpu::CommandEncoder, frame_index: u64) -> bool {
        if self.last_executed_frame == Some(frame_index) {
            return false;
        }
        self.pipeline.execute(encoder);
        self.last_executed_frame = Some(frame_index);
        true
    }

    pub fn write_params(&self, queue: &wgpu::Queue, params: &EffectParams) {
        self.pipeline.write_params(queue, params);
    }

    pub fn release(self) {
        tracing::debug!(effect = %self.effect, generation = self.generation, "releasing pipeline");
        self.pipeline.release();
    }
}

#[derive(Debug, Default)]
pub struct EffectRegistry {
    next_generation: u64,
}

impl EffectRegistry {
    /// Parses an effect identifier, degrading to [`Effect::Original`] when it is unknown
    pub fn resolve(name: &str) -> Effect {
        name.parse().unwrap_or_else(|e: EffectError| {
            tracing::warn!(error = %e, "invalid effect selection, falling back to Original");
            Effect::Original
        })
    }

    /// Builds the pipeline for `name` over `input`
    ///
    /// `target` is the current display size, which composite modes use to decide how many
    /// upscale stages to chain.
    pub fn build(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        input: &wgpu::Texture,
        target: (u32, u32),
        params: &EffectParams,
    ) -> Result<ActivePipeline, EffectError> {
        let effect = Self::resolve(name);
        let dimensions = PresetDimensions {
            native: (input.width(), input.height()),
            target,
        };
        let pipeline = effect.build(device, input, dimensions, params)?;

        self.next_generation += 1;
        let active = ActivePipeline {
            effect,
            generation: self.next_generation,
            pipeline,
            last_executed_frame: None,
        };
        tracing::info!(
            effect = %effect,
            generation = active.generation,
            output = ?active.output_dimensions(),
            "pipeline built"
        );
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ingest::VideoFrameTexture, test_support::test_device};

    #[test]
    fn resolves_known_identifiers() {
        assert_eq!(EffectRegistry::resolve("Mode C+A"), Effect::ModeCA);
        assert_eq!(EffectRegistry::resolve("Restore-CNNL"), Effect::RestoreL);
    }

    #[test]
    fn unknown_identifiers_degrade_to_original() {
        assert_eq!(EffectRegistry::resolve("Sharpen-Max"), Effect::Original);
        assert_eq!(EffectRegistry::resolve(""), Effect::Original);
    }

    #[test]
    fn rebuilding_the_same_effect_is_stable() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            return;
        };
        let input = VideoFrameTexture::new(&device, (96, 54));
        let mut registry = EffectRegistry::default();
        let params = EffectParams::default();

        let mut active = registry.build(&device, "Upscale-CNNx2M", input.texture(), (96, 54), &params).unwrap();
        let first = (active.generation(), active.output_dimensions());
        let rebuilt = registry.build(&device, "Upscale-CNNx2M", input.texture(), (96, 54), &params).unwrap();
        std::mem::replace(&mut active, rebuilt).release();

        assert_eq!(active.output_dimensions(), first.1);
        assert_eq!(active.output_dimensions(), (192, 108));
        assert_eq!(active.generation(), first.0 + 1);
        active.release();
    }
}
