//! Executable pipeline definitions and runtime structures
//!
//! This module defines the static data structures that describe an effect's GPU program:
//! the physical textures it allocates, the samplers and parameter buffers it binds, and
//! the compute passes it dispatches. The executor turns these descriptions into live
//! wgpu resources.

/// Physical texture id reserved for the pipeline input
pub const SOURCE_TEXTURE_ID: u32 = u32::MAX;

/// Represents a rational scale factor as a fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFactor {
    /// The numerator of the scale factor fraction
    pub numerator: u32,
    /// The denominator of the scale factor fraction
    pub denominator: u32,
}

impl ScaleFactor {
    /// Identity scale
    pub const ONE: Self = Self::new(1, 1);
    /// Doubling scale used by every upscale stage
    pub const TWO: Self = Self::new(2, 1);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    /// Applies this factor to a length in pixels, rounding down
    pub fn apply(&self, length: u32) -> u32 {
        (length as u64 * self.numerator as u64 / self.denominator as u64) as u32
    }
}

/// Texture sampling filter modes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SamplerFilterMode {
    /// Nearest neighbor sampling - sharp, pixelated
    #[allow(unused)]
    Nearest,
    /// Linear interpolation sampling - smooth, blurred
    Linear,
}

/// Where the values of a pass parameter buffer come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Always the declared defaults
    Fixed,
    /// `x` is replaced by the user's deblur strength
    DeblurStrength,
    /// `x`/`y` are replaced by the user's denoise intensity and spatial sigmas
    DenoiseSigmas,
}

/// User-tunable coefficients of the parameterized effects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Deblur-DoG strength
    pub deblur_strength: f32,
    /// Bilateral filter intensity sigma
    pub denoise_intensity_sigma: f32,
    /// Bilateral filter spatial sigma
    pub denoise_spatial_sigma: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            deblur_strength: 2.0,
            denoise_intensity_sigma: 0.2,
            denoise_spatial_sigma: 2.0,
        }
    }
}

/// A complete pipeline description ready for binding
#[derive(Debug, Clone)]
pub struct ExecutablePipeline {
    /// Human-readable name for debugging
    pub(crate) name: &'static str,
    /// Physical textures used by this pipeline
    pub(crate) textures: &'static [PhysicalTexture],
    /// Sampler filter modes required by this pipeline
    pub(crate) samplers: &'static [SamplerFilterMode],
    /// Shader passes to execute in sequence
    pub(crate) passes: &'static [ExecutablePass],
}

impl ExecutablePipeline {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of compute passes dispatched per frame
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Number of textures this pipeline allocates on top of its input
    pub fn intermediate_texture_count(&self) -> usize {
        self.textures.iter().filter(|texture| !texture.is_source).count()
    }

    /// Number of samplers this pipeline allocates
    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    /// Number of uniform parameter buffers this pipeline allocates
    pub fn param_buffer_count(&self) -> usize {
        self.passes.iter().filter(|pass| pass.params.is_some()).count()
    }

    /// The physical texture written by the final pass
    pub(crate) fn output_physical_texture(&self) -> Option<&'static PhysicalTexture> {
        let output_id = self.passes.last()?.output_textures.first()?.physical_texture_id;
        self.textures.iter().find(|texture| texture.id == output_id)
    }

    /// Computes this pipeline's output size for a given input size
    pub fn output_size(&self, input_size: (u32, u32)) -> (u32, u32) {
        match self.output_physical_texture() {
            Some(texture) => (texture.scale_factor.0.apply(input_size.0), texture.scale_factor.1.apply(input_size.1)),
            None => input_size,
        }
    }
}

/// Represents a physical texture resource in the GPU
#[derive(Debug, Clone)]
pub struct PhysicalTexture {
    /// Unique identifier for this texture
    pub id: u32,
    /// Number of color components (1=R, 2=RG, 4=RGBA)
    pub components: u32,
    /// Scale factors for width and height relative to input
    pub scale_factor: (ScaleFactor, ScaleFactor),
    /// Whether this texture represents the source input
    pub is_source: bool,
}

/// A single shader pass within a pipeline
#[derive(Debug, Clone)]
pub struct ExecutablePass {
    /// Human-readable name for debugging
    pub name: &'static str,
    /// WGSL shader source code
    pub shader: &'static str,
    /// Compute dispatch scale factors (width, height)
    pub compute_scale_factors: (f64, f64),
    /// Input texture bindings for this pass
    pub input_textures: &'static [InputTextureBinding],
    /// Output texture bindings for this pass
    pub output_textures: &'static [OutputTextureBinding],
    /// Sampler bindings for this pass
    pub samplers: &'static [SamplerBinding],
    /// Uniform parameter buffer, if the kernel takes one
    pub params: Option<ParamBinding>,
}

/// Binding information for an input texture
#[derive(Debug, Clone)]
pub struct InputTextureBinding {
    /// Shader binding point index
    pub binding: u32,
    /// ID of the physical texture to bind
    pub physical_texture_id: u32,
}

/// Binding information for an output texture
#[derive(Debug, Clone)]
pub struct OutputTextureBinding {
    /// Shader binding point index
    pub binding: u32,
    /// ID of the physical texture to bind
    pub physical_texture_id: u32,
}

/// Binding information for a texture sampler
#[derive(Debug, Clone)]
pub struct SamplerBinding {
    /// Shader binding point index
    pub binding: u32,
    /// Filter mode for this sampler
    pub filter_mode: SamplerFilterMode,
}

/// Binding information for a `vec4<f32>` uniform parameter block
#[derive(Debug, Clone)]
pub struct ParamBinding {
    /// Shader binding point index
    pub binding: u32,
    /// Values written when the buffer is created
    pub defaults: [f32; 4],
    /// Which user coefficients override the defaults
    pub source: ParamSource,
}

impl ParamBinding {
    /// Resolves the buffer contents for the given user coefficients
    pub fn resolve(&self, params: &EffectParams) -> [f32; 4] {
        let mut values = self.defaults;
        match self.source {
            ParamSource::Fixed => {}
            ParamSource::DeblurStrength => values[0] = params.deblur_strength,
            ParamSource::DenoiseSigmas => {
                values[0] = params.denoise_intensity_sigma;
                values[1] = params.denoise_spatial_sigma;
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_rounds_down() {
        assert_eq!(ScaleFactor::TWO.apply(1280), 2560);
        assert_eq!(ScaleFactor::new(1, 2).apply(1281), 640);
        assert_eq!(ScaleFactor::ONE.apply(7), 7);
    }

    #[test]
    fn fixed_params_ignore_user_coefficients() {
        let binding = ParamBinding {
            binding: 2,
            defaults: [0.5, 0.0, 0.0, 0.0],
            source: ParamSource::Fixed,
        };
        let params = EffectParams {
            deblur_strength: 9.0,
            ..EffectParams::default()
        };
        assert_eq!(binding.resolve(&params), [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn denoise_params_override_both_sigmas() {
        let binding = ParamBinding {
            binding: 2,
            defaults: [0.1, 1.0, 0.0, 0.0],
            source: ParamSource::DenoiseSigmas,
        };
        let params = EffectParams {
            denoise_intensity_sigma: 0.3,
            denoise_spatial_sigma: 3.0,
            ..EffectParams::default()
        };
        assert_eq!(binding.resolve(&params), [0.3, 3.0, 0.0, 0.0]);
    }
}
