//! Shader pipeline execution engine
//!
//! Binds static pipeline descriptors to wgpu resources and records their compute
//! passes in sequence. Every texture and uniform buffer created here is owned by the
//! executor and destroyed by [`PipelineExecutor::release`].

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    EffectError, ExecutablePipeline,
    executable_pipeline::{EffectParams, ParamBinding, SamplerFilterMode},
};

/// Compute shader workgroup size in X dimension
const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

/// A pipeline bound to wgpu resources, ready for execution
#[derive(Debug)]
struct BoundPipeline {
    /// Collection of executable passes with their bound resources
    passes: Vec<BoundExecutablePass>,
    /// Textures allocated for this pipeline, excluding its input
    owned_textures: Vec<wgpu::Texture>,
}

/// A single executable pass bound to wgpu resources
#[derive(Debug)]
struct BoundExecutablePass {
    /// Human-readable name for debugging
    name: &'static str,
    /// Compute dispatch dimensions (width, height)
    compute_dimensions: (u32, u32),
    /// The wgpu compute pipeline
    compute_pipeline: wgpu::ComputePipeline,
    /// Bind group containing all resources for this pass
    bind_group: wgpu::BindGroup,
    /// Uniform parameter buffer and the binding it was created from
    params: Option<(ParamBinding, wgpu::Buffer)>,
}

fn create_sampler(device: &wgpu::Device, filter_mode: &SamplerFilterMode) -> wgpu::Sampler {
    let filter = match filter_mode {
        SamplerFilterMode::Nearest => wgpu::FilterMode::Nearest,
        SamplerFilterMode::Linear => wgpu::FilterMode::Linear,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("Sampler {filter_mode:?}")),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        lod_min_clamp: 0.0,
        lod_max_clamp: 0.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    })
}

impl BoundPipeline {
    /// Binds `pipeline` to `input_texture`, allocating its intermediate textures,
    /// samplers and parameter buffers
    ///
    /// # Returns
    /// A tuple of (bound pipeline, final output texture)
    fn new(
        pipeline: &'static ExecutablePipeline,
        device: &wgpu::Device,
        input_texture: &wgpu::Texture,
        params: &EffectParams,
    ) -> Result<(Self, wgpu::Texture), EffectError> {
        let input_size = (input_texture.width(), input_texture.height());
        let mut owned_textures = Vec::new();

        let mut physical_texture_map = HashMap::new();
        for pt in pipeline.textures {
            let texture = if pt.is_source {
                input_texture.clone()
            } else {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{} Texture {}", pipeline.name, pt.id)),
                    size: wgpu::Extent3d {
                        width: pt.scale_factor.0.apply(input_size.0),
                        height: pt.scale_factor.1.apply(input_size.1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: match pt.components {
                        1 => wgpu::TextureFormat::R32Float,
                        2 => wgpu::TextureFormat::Rg32Float,
                        _ => wgpu::TextureFormat::Rgba32Float,
                    },
                    usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                owned_textures.push(texture.clone());
                texture
            };
            let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            physical_texture_map.insert(pt.id, (texture, texture_view));
        }

        let mut sampler_map = HashMap::new();
        let pass_samplers = pipeline.passes.iter().flat_map(|pass| pass.samplers.iter().map(|sampler| &sampler.filter_mode));
        for filter_mode in pipeline.samplers.iter().chain(pass_samplers) {
            sampler_map.entry(filter_mode.clone()).or_insert_with(|| create_sampler(device, filter_mode));
        }

        let lookup = |texture_id: u32| {
            physical_texture_map.get(&texture_id).ok_or(EffectError::MissingTexture {
                pipeline: pipeline.name,
                texture_id,
            })
        };

        let mut passes = Vec::new();

        for shader_pass in pipeline.passes {
            let compute_dimensions = (
                (input_size.0 as f64 * shader_pass.compute_scale_factors.0).floor() as u32,
                (input_size.1 as f64 * shader_pass.compute_scale_factors.1).floor() as u32,
            );
            let skip_bound_check = compute_dimensions.0 % COMPUTE_WORKGROUP_SIZE_X == 0 && compute_dimensions.1 % COMPUTE_WORKGROUP_SIZE_Y == 0;

            let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader_pass.name),
                source: wgpu::ShaderSource::Wgsl(shader_pass.shader.into()),
            });

            let mut bind_group_layout_entries = Vec::new();

            for input in shader_pass.input_textures {
                bind_group_layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: input.binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                });
            }

            for output in shader_pass.output_textures {
                let storage_format = lookup(output.physical_texture_id)?.0.format();
                bind_group_layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: output.binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: storage_format,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                });
            }

            for sampler in shader_pass.samplers {
                bind_group_layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: sampler.binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }

            if let Some(param_binding) = &shader_pass.params {
                bind_group_layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: param_binding.binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                });
            }

            bind_group_layout_entries.sort_by_key(|entry| entry.binding);

            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(shader_pass.name),
                entries: &bind_group_layout_entries,
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(shader_pass.name),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(shader_pass.name),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: if skip_bound_check { Some("main_unchecked") } else { Some("main") },
                compilation_options: Default::default(),
                cache: None,
            });

            let param_buffer = shader_pass.params.as_ref().map(|param_binding| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(shader_pass.name),
                    contents: bytemuck::cast_slice(&param_binding.resolve(params)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                (param_binding.clone(), buffer)
            });

            let mut bind_group_entries = Vec::new();

            for input in shader_pass.input_textures {
                let (_, texture_view) = lookup(input.physical_texture_id)?;
                bind_group_entries.push(wgpu::BindGroupEntry {
                    binding: input.binding,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                });
            }

            for output in shader_pass.output_textures {
                let (_, texture_view) = lookup(output.physical_texture_id)?;
                bind_group_entries.push(wgpu::BindGroupEntry {
                    binding: output.binding,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                });
            }

            for sampler in shader_pass.samplers {
                if let Some(sampler_resource) = sampler_map.get(&sampler.filter_mode) {
                    bind_group_entries.push(wgpu::BindGroupEntry {
                        binding: sampler.binding,
                        resource: wgpu::BindingResource::Sampler(sampler_resource),
                    });
                }
            }

            if let Some((param_binding, buffer)) = &param_buffer {
                bind_group_entries.push(wgpu::BindGroupEntry {
                    binding: param_binding.binding,
                    resource: buffer.as_entire_binding(),
                });
            }

            bind_group_entries.sort_by_key(|entry| entry.binding);

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(shader_pass.name),
                layout: &bind_group_layout,
                entries: &bind_group_entries,
            });

            passes.push(BoundExecutablePass {
                name: shader_pass.name,
                compute_dimensions,
                compute_pipeline,
                bind_group,
                params: param_buffer,
            });
        }

        let output_id = pipeline
            .passes
            .last()
            .and_then(|pass| pass.output_textures.first())
            .map(|output| output.physical_texture_id)
            .ok_or(EffectError::EmptyPipeline(pipeline.name))?;
        let output_texture = lookup(output_id)?.0.clone();

        Ok((BoundPipeline { passes, owned_textures }, output_texture))
    }

    /// Records all passes of this pipeline
    fn pass(&self, encoder: &mut wgpu::CommandEncoder) {
        for pass in self.passes.iter() {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(pass.name),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(&pass.compute_pipeline);
            compute_pass.set_bind_group(0, &pass.bind_group, &[]);

            let (compute_width, compute_height) = pass.compute_dimensions;
            let workgroup_x = compute_width.div_ceil(COMPUTE_WORKGROUP_SIZE_X);
            let workgroup_y = compute_height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y);

            compute_pass.dispatch_workgroups(workgroup_x, workgroup_y, 1);
        }
    }

    fn write_params(&self, queue: &wgpu::Queue, params: &EffectParams) {
        for (param_binding, buffer) in self.passes.iter().filter_map(|pass| pass.params.as_ref()) {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&param_binding.resolve(params)));
        }
    }

    fn release(self) {
        for (_, buffer) in self.passes.iter().filter_map(|pass| pass.params.as_ref()) {
            buffer.destroy();
        }
        for texture in &self.owned_textures {
            texture.destroy();
        }
    }
}

/// A chain of bound pipelines where each output feeds the next input
#[derive(Debug)]
pub struct PipelineExecutor {
    /// Collection of bound pipelines to execute in sequence
    bound_pipelines: Vec<BoundPipeline>,
    /// Output of the last bound pipeline
    output_texture: wgpu::Texture,
}

impl PipelineExecutor {
    /// Binds all pipelines to GPU resources and chains them together so that
    /// the output of one pipeline becomes the input of the next.
    ///
    /// # Arguments
    /// * `executable_pipelines` - Pipelines to chain together, in execution order
    /// * `device` - The wgpu device for resource creation
    /// * `source_texture` - The initial input texture
    /// * `params` - Initial values for the tunable parameter buffers
    pub fn new(
        executable_pipelines: &[&'static ExecutablePipeline],
        device: &wgpu::Device,
        source_texture: &wgpu::Texture,
        params: &EffectParams,
    ) -> Result<Self, EffectError> {
        let mut bound_pipelines = Vec::new();
        let mut current_input_texture = source_texture.clone();

        for pipeline in executable_pipelines {
            match BoundPipeline::new(pipeline, device, &current_input_texture, params) {
                Ok((bound_pipeline, output_texture)) => {
                    current_input_texture = output_texture;
                    bound_pipelines.push(bound_pipeline);
                }
                Err(e) => {
                    for bound_pipeline in bound_pipelines {
                        bound_pipeline.release();
                    }
                    return Err(e);
                }
            }
        }

        if bound_pipelines.is_empty() {
            return Err(EffectError::EmptyPipeline("executor"));
        }

        Ok(Self {
            bound_pipelines,
            output_texture: current_input_texture,
        })
    }

    /// Records the entire chain into `encoder`
    pub fn pass(&self, encoder: &mut wgpu::CommandEncoder) {
        for bound_pipeline in &self.bound_pipelines {
            bound_pipeline.pass(encoder);
        }
    }

    pub fn output_texture(&self) -> &wgpu::Texture {
        &self.output_texture
    }

    /// Rewrites every tunable parameter buffer in place
    pub fn write_params(&self, queue: &wgpu::Queue, params: &EffectParams) {
        for bound_pipeline in &self.bound_pipelines {
            bound_pipeline.write_params(queue, params);
        }
    }

    /// Destroys every texture and buffer owned by the chain
    pub fn release(self) {
        for bound_pipeline in self.bound_pipelines {
            bound_pipeline.release();
        }
    }
}
