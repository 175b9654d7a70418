//! Static pipeline descriptors for every kernel shipped with this crate
//!
//! Kernels are validated and minified by the build script; the descriptors below
//! wire them into single- or multi-pass pipelines.

use crate::executable_pipeline::*;

const DEBLUR_DOG_WGSL: &str = include_str!(concat!(env!("OUT_DIR"), "/deblur_dog.wgsl"));
const DENOISE_BILATERAL_MEAN_WGSL: &str = include_str!(concat!(env!("OUT_DIR"), "/denoise_bilateral_mean.wgsl"));
const RESTORE_WGSL: &str = include_str!(concat!(env!("OUT_DIR"), "/restore.wgsl"));
const UPSCALE_X2_WGSL: &str = include_str!(concat!(env!("OUT_DIR"), "/upscale_x2.wgsl"));

const SOURCE: PhysicalTexture = PhysicalTexture {
    id: SOURCE_TEXTURE_ID,
    components: 4,
    scale_factor: (ScaleFactor::ONE, ScaleFactor::ONE),
    is_source: true,
};

const NATIVE_OUTPUT: PhysicalTexture = PhysicalTexture {
    id: 0,
    components: 4,
    scale_factor: (ScaleFactor::ONE, ScaleFactor::ONE),
    is_source: false,
};

const DOUBLED_OUTPUT: PhysicalTexture = PhysicalTexture {
    id: 0,
    components: 4,
    scale_factor: (ScaleFactor::TWO, ScaleFactor::TWO),
    is_source: false,
};

const SOURCE_INPUT: &[InputTextureBinding] = &[InputTextureBinding {
    binding: 0,
    physical_texture_id: SOURCE_TEXTURE_ID,
}];

const FIRST_OUTPUT: &[OutputTextureBinding] = &[OutputTextureBinding {
    binding: 1,
    physical_texture_id: 0,
}];

const LINEAR_SAMPLER: &[SamplerBinding] = &[SamplerBinding {
    binding: 2,
    filter_mode: SamplerFilterMode::Linear,
}];

/// Builds a single native-resolution pass over the source texture
const fn native_pass(name: &'static str, shader: &'static str, defaults: [f32; 4], source: ParamSource) -> ExecutablePass {
    ExecutablePass {
        name,
        shader,
        compute_scale_factors: (1.0, 1.0),
        input_textures: SOURCE_INPUT,
        output_textures: FIRST_OUTPUT,
        samplers: &[],
        params: Some(ParamBinding { binding: 2, defaults, source }),
    }
}

/// Builds a single 2x upscale pass over the source texture
const fn upscale_pass(name: &'static str, strength: f32) -> ExecutablePass {
    ExecutablePass {
        name,
        shader: UPSCALE_X2_WGSL,
        compute_scale_factors: (2.0, 2.0),
        input_textures: SOURCE_INPUT,
        output_textures: FIRST_OUTPUT,
        samplers: LINEAR_SAMPLER,
        params: Some(ParamBinding {
            binding: 3,
            defaults: [strength, 0.0, 0.0, 0.0],
            source: ParamSource::Fixed,
        }),
    }
}

/// Difference-of-Gaussians deblur with a user-tunable strength
pub const DEBLUR_DOG: ExecutablePipeline = ExecutablePipeline {
    name: "Deblur DoG",
    textures: &[SOURCE, NATIVE_OUTPUT],
    samplers: &[],
    passes: &[native_pass("Deblur DoG", DEBLUR_DOG_WGSL, [2.0, 0.0, 0.0, 0.0], ParamSource::DeblurStrength)],
};

/// Bilateral mean denoise with user-tunable sigmas
pub const DENOISE_BILATERAL_MEAN: ExecutablePipeline = ExecutablePipeline {
    name: "Denoise Bilateral Mean",
    textures: &[SOURCE, NATIVE_OUTPUT],
    samplers: &[],
    passes: &[native_pass(
        "Denoise Bilateral Mean",
        DENOISE_BILATERAL_MEAN_WGSL,
        [0.2, 2.0, 0.0, 0.0],
        ParamSource::DenoiseSigmas,
    )],
};

pub const RESTORE_M: ExecutablePipeline = ExecutablePipeline {
    name: "Restore M",
    textures: &[SOURCE, NATIVE_OUTPUT],
    samplers: &[],
    passes: &[native_pass("Restore M", RESTORE_WGSL, [0.5, 0.0, 0.0, 0.0], ParamSource::Fixed)],
};

pub const RESTORE_L: ExecutablePipeline = ExecutablePipeline {
    name: "Restore L",
    textures: &[SOURCE, NATIVE_OUTPUT],
    samplers: &[],
    passes: &[native_pass("Restore L", RESTORE_WGSL, [1.0, 0.0, 0.0, 0.0], ParamSource::Fixed)],
};

pub const RESTORE_SOFT_M: ExecutablePipeline = ExecutablePipeline {
    name: "Restore Soft M",
    textures: &[SOURCE, NATIVE_OUTPUT],
    samplers: &[],
    passes: &[native_pass("Restore Soft M", RESTORE_WGSL, [0.25, 0.0, 0.0, 0.0], ParamSource::Fixed)],
};

pub const UPSCALE_X2_M: ExecutablePipeline = ExecutablePipeline {
    name: "Upscale x2 M",
    textures: &[SOURCE, DOUBLED_OUTPUT],
    samplers: &[SamplerFilterMode::Linear],
    passes: &[upscale_pass("Upscale x2 M", 0.5)],
};

pub const UPSCALE_X2_UL: ExecutablePipeline = ExecutablePipeline {
    name: "Upscale x2 UL",
    textures: &[SOURCE, DOUBLED_OUTPUT],
    samplers: &[SamplerFilterMode::Linear],
    passes: &[upscale_pass("Upscale x2 UL", 1.0)],
};

/// Light denoise at native resolution followed by a 2x upscale
pub const UPSCALE_DENOISE_X2_M: ExecutablePipeline = ExecutablePipeline {
    name: "Upscale Denoise x2 M",
    textures: &[
        SOURCE,
        NATIVE_OUTPUT,
        PhysicalTexture {
            id: 1,
            components: 4,
            scale_factor: (ScaleFactor::TWO, ScaleFactor::TWO),
            is_source: false,
        },
    ],
    samplers: &[SamplerFilterMode::Linear],
    passes: &[
        native_pass(
            "Upscale Denoise x2 M Denoise",
            DENOISE_BILATERAL_MEAN_WGSL,
            [0.1, 1.0, 0.0, 0.0],
            ParamSource::Fixed,
        ),
        ExecutablePass {
            name: "Upscale Denoise x2 M Upscale",
            shader: UPSCALE_X2_WGSL,
            compute_scale_factors: (2.0, 2.0),
            input_textures: &[InputTextureBinding {
                binding: 0,
                physical_texture_id: 0,
            }],
            output_textures: &[OutputTextureBinding {
                binding: 1,
                physical_texture_id: 1,
            }],
            samplers: LINEAR_SAMPLER,
            params: Some(ParamBinding {
                binding: 3,
                defaults: [0.5, 0.0, 0.0, 0.0],
                source: ParamSource::Fixed,
            }),
        },
    ],
};
