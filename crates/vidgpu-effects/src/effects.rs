//! The closed set of selectable effects
//!
//! Each [`Effect`] maps to a chain of static pipelines. Composite modes additionally
//! receive native and target dimensions and append 2x upscale stages until the target
//! scale is reached.

use std::{fmt, str::FromStr};

use crate::{
    BuiltPipeline, EffectError, ExecutablePipeline, PipelineExecutor,
    executable_pipeline::EffectParams,
    pipelines::{DEBLUR_DOG, DENOISE_BILATERAL_MEAN, RESTORE_L, RESTORE_M, RESTORE_SOFT_M, UPSCALE_DENOISE_X2_M, UPSCALE_X2_M, UPSCALE_X2_UL},
};

/// Native (input) and target (display) dimensions handed to composite modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetDimensions {
    pub native: (u32, u32),
    pub target: (u32, u32),
}

impl PresetDimensions {
    /// Scale factor from native to target, taking the larger axis
    pub fn target_scale_factor(&self) -> f64 {
        let width = self.target.0 as f64 / self.native.0.max(1) as f64;
        let height = self.target.1 as f64 / self.native.1.max(1) as f64;
        width.max(height)
    }
}

/// GPU resources an effect allocates when built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceRequirements {
    pub passes: usize,
    pub intermediate_textures: usize,
    pub samplers: usize,
    pub param_buffers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Effect {
    /// Input shown unmodified
    #[default]
    Original,
    DeblurDog,
    DenoiseBilateralMean,
    UpscaleX2M,
    UpscaleX2UL,
    RestoreM,
    RestoreL,
    /// Restore then upscale
    ModeA,
    /// Soft restore then upscale
    ModeB,
    /// Combined upscale and denoise
    ModeC,
    /// Mode A with an additional restore pass after the upscale
    ModeAA,
    /// Mode B with an additional soft restore pass after the upscale
    ModeBB,
    /// Mode C followed by a restore pass
    ModeCA,
}

impl Effect {
    pub const ALL: [Effect; 13] = [
        Effect::Original,
        Effect::DeblurDog,
        Effect::DenoiseBilateralMean,
        Effect::UpscaleX2M,
        Effect::UpscaleX2UL,
        Effect::RestoreM,
        Effect::RestoreL,
        Effect::ModeA,
        Effect::ModeB,
        Effect::ModeC,
        Effect::ModeAA,
        Effect::ModeBB,
        Effect::ModeCA,
    ];

    /// Returns the identifier used by settings and UI controls
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Original => "Original",
            Effect::DeblurDog => "Deblur-DoG",
            Effect::DenoiseBilateralMean => "Denoise-BilateralMean",
            Effect::UpscaleX2M => "Upscale-CNNx2M",
            Effect::UpscaleX2UL => "Upscale-CNNx2UL",
            Effect::RestoreM => "Restore-CNNM",
            Effect::RestoreL => "Restore-CNNL",
            Effect::ModeA => "Mode A",
            Effect::ModeB => "Mode B",
            Effect::ModeC => "Mode C",
            Effect::ModeAA => "Mode A+A",
            Effect::ModeBB => "Mode B+B",
            Effect::ModeCA => "Mode C+A",
        }
    }

    /// Whether this effect is a composite mode that takes [`PresetDimensions`]
    pub fn is_mode(&self) -> bool {
        matches!(
            self,
            Effect::ModeA | Effect::ModeB | Effect::ModeC | Effect::ModeAA | Effect::ModeBB | Effect::ModeCA
        )
    }

    /// Creates the pipeline chain for this effect
    ///
    /// Returns an empty chain for [`Effect::Original`].
    pub fn create_pipelines(&self, dimensions: PresetDimensions) -> Vec<&'static ExecutablePipeline> {
        let mut base: Vec<&'static ExecutablePipeline> = match self {
            Effect::Original => return vec![],
            Effect::DeblurDog => return vec![&DEBLUR_DOG],
            Effect::DenoiseBilateralMean => return vec![&DENOISE_BILATERAL_MEAN],
            Effect::UpscaleX2M => return vec![&UPSCALE_X2_M],
            Effect::UpscaleX2UL => return vec![&UPSCALE_X2_UL],
            Effect::RestoreM => return vec![&RESTORE_M],
            Effect::RestoreL => return vec![&RESTORE_L],
            Effect::ModeA => vec![&RESTORE_M, &UPSCALE_X2_M],
            Effect::ModeB => vec![&RESTORE_SOFT_M, &UPSCALE_X2_M],
            Effect::ModeC => vec![&UPSCALE_DENOISE_X2_M],
            Effect::ModeAA => vec![&RESTORE_M, &UPSCALE_X2_M, &RESTORE_M],
            Effect::ModeBB => vec![&RESTORE_SOFT_M, &UPSCALE_X2_M, &RESTORE_SOFT_M],
            Effect::ModeCA => vec![&UPSCALE_DENOISE_X2_M, &RESTORE_M],
        };

        let target_scale_factor = dimensions.target_scale_factor();
        let mut current_scale_factor = 2.0;
        while current_scale_factor < target_scale_factor {
            base.push(&UPSCALE_X2_M);
            current_scale_factor *= 2.0;
        }

        base
    }

    /// Output dimensions of this effect for the given input
    pub fn output_dimensions(&self, dimensions: PresetDimensions) -> (u32, u32) {
        self.create_pipelines(dimensions)
            .iter()
            .fold(dimensions.native, |size, pipeline| pipeline.output_size(size))
    }

    /// Resources allocated when this effect is built
    pub fn requirements(&self, dimensions: PresetDimensions) -> ResourceRequirements {
        self.create_pipelines(dimensions)
            .iter()
            .fold(ResourceRequirements::default(), |acc, pipeline| ResourceRequirements {
                passes: acc.passes + pipeline.pass_count(),
                intermediate_textures: acc.intermediate_textures + pipeline.intermediate_texture_count(),
                samplers: acc.samplers + pipeline.sampler_count(),
                param_buffers: acc.param_buffers + pipeline.param_buffer_count(),
            })
    }

    /// Binds this effect to `input_texture`
    pub fn build(
        &self,
        device: &wgpu::Device,
        input_texture: &wgpu::Texture,
        dimensions: PresetDimensions,
        params: &EffectParams,
    ) -> Result<BuiltPipeline, EffectError> {
        let pipelines = self.create_pipelines(dimensions);
        if pipelines.is_empty() {
            return Ok(BuiltPipeline::passthrough(input_texture));
        }
        tracing::debug!(effect = self.name(), stages = pipelines.len(), "binding effect pipeline");
        Ok(BuiltPipeline::Executor(PipelineExecutor::new(&pipelines, device, input_texture, params)?))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Effect::ALL
            .into_iter()
            .find(|effect| effect.name() == s)
            .ok_or_else(|| EffectError::UnknownEffect(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: PresetDimensions = PresetDimensions {
        native: (1280, 720),
        target: (1280, 720),
    };

    #[test]
    fn names_round_trip_through_from_str() {
        for effect in Effect::ALL {
            assert_eq!(effect.name().parse::<Effect>().ok(), Some(effect));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!("Mode Z".parse::<Effect>(), Err(EffectError::UnknownEffect(name)) if name == "Mode Z"));
        assert!("mode a".parse::<Effect>().is_err());
    }

    #[test]
    fn identity_effects_keep_input_dimensions() {
        for effect in [Effect::Original, Effect::DeblurDog, Effect::DenoiseBilateralMean, Effect::RestoreM, Effect::RestoreL] {
            assert_eq!(effect.output_dimensions(HD), (1280, 720), "{effect}");
        }
    }

    #[test]
    fn upscale_effects_double_dimensions() {
        for effect in [Effect::UpscaleX2M, Effect::UpscaleX2UL] {
            assert_eq!(effect.output_dimensions(HD), (2560, 1440), "{effect}");
        }
        for effect in Effect::ALL.into_iter().filter(Effect::is_mode) {
            assert_eq!(effect.output_dimensions(HD), (2560, 1440), "{effect}");
        }
    }

    #[test]
    fn modes_append_upscales_until_target_is_reached() {
        let dimensions = PresetDimensions {
            native: (640, 360),
            target: (2560, 1440),
        };
        assert_eq!(Effect::ModeA.create_pipelines(dimensions).len(), 3);
        assert_eq!(Effect::ModeA.output_dimensions(dimensions), (2560, 1440));

        let wider = PresetDimensions {
            native: (640, 360),
            target: (3000, 360),
        };
        assert_eq!(Effect::ModeC.output_dimensions(wider), (5120, 2880));
    }

    #[test]
    fn non_mode_effects_ignore_target() {
        let dimensions = PresetDimensions {
            native: (640, 360),
            target: (5120, 2880),
        };
        assert_eq!(Effect::UpscaleX2M.output_dimensions(dimensions), (1280, 720));
    }

    #[test]
    fn requirements_count_allocated_resources() {
        assert_eq!(Effect::Original.requirements(HD), ResourceRequirements::default());
        assert_eq!(
            Effect::ModeA.requirements(HD),
            ResourceRequirements {
                passes: 2,
                intermediate_textures: 2,
                samplers: 1,
                param_buffers: 2,
            }
        );
        assert_eq!(
            Effect::ModeCA.requirements(HD),
            ResourceRequirements {
                passes: 3,
                intermediate_textures: 3,
                samplers: 1,
                param_buffers: 3,
            }
        );
    }

    #[test]
    fn zero_sized_native_does_not_divide_by_zero() {
        let dimensions = PresetDimensions {
            native: (0, 0),
            target: (4, 4),
        };
        assert!(dimensions.target_scale_factor().is_finite());
    }
}
