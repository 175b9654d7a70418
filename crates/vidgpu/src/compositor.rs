//! Final render pass: processed output, optionally split against the raw frame
//!
//! The render pipeline, sampler and comparison uniforms are created once per session.
//! Only the bind group depends on the active pipeline, so a pipeline swap costs one
//! [`Compositor::rebind`] and a comparison change costs two small buffer writes.

use wgpu::util::DeviceExt;

/// Half-width of the red marker line, in normalized output coordinates
pub const SPLIT_EPSILON: f32 = 0.001;

/// Which image a given output column shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonSource {
    Raw,
    Marker,
    Processed,
}

/// CPU mirror of the fragment shader's column selection
pub fn comparison_source(x: f32, compare_on: bool, split: f32) -> ComparisonSource {
    if !compare_on {
        ComparisonSource::Processed
    } else if x < split - SPLIT_EPSILON {
        ComparisonSource::Raw
    } else if x <= split + SPLIT_EPSILON {
        ComparisonSource::Marker
    } else {
        ComparisonSource::Processed
    }
}

/// Bind group wiring one pipeline output and the raw input into the compositor
#[derive(Debug)]
pub struct RenderBindingSet {
    bind_group: wgpu::BindGroup,
    generation: u64,
}

impl RenderBindingSet {
    /// Generation of the pipeline these bindings were built for
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub struct Compositor {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    compare_buffer: wgpu::Buffer,
    split_buffer: wgpu::Buffer,
}

impl Compositor {
    /// Builds the render pipeline for `format` and initializes the comparison uniforms
    pub fn configure(device: &wgpu::Device, format: wgpu::TextureFormat, compare_on: bool, split: f32) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Compositor bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture_entry(1),
                uniform_entry(2),
                texture_entry(3),
                uniform_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Compositor pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader_module = device.create_shader_module(wgpu::include_wgsl!("../shaders/composite.wgsl"));

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Compositor pipeline"),
            layout: Some(&pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader_module,
                buffers: &[],
                compilation_options: Default::default(),
                entry_point: Some("vs_main"),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
                entry_point: Some("fs_main"),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            depth_stencil: None,
        });

        let sampler = device.create_sampler(&sampler_descriptor());

        let compare_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Compare uniform"),
            contents: bytemuck::bytes_of(&(compare_on as u32)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let split_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Split ratio uniform"),
            contents: bytemuck::bytes_of(&split),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        tracing::debug!(?format, "compositor configured");

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            compare_buffer,
            split_buffer,
        }
    }

    /// Wires `processed` and `raw` into a new binding set for pipeline `generation`
    pub fn rebind(&self, device: &wgpu::Device, processed: &wgpu::Texture, raw: &wgpu::Texture, generation: u64) -> RenderBindingSet {
        let processed_view = processed.create_view(&wgpu::TextureViewDescriptor::default());
        let raw_view = raw.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compositor bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&processed_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.compare_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&raw_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.split_buffer.as_entire_binding(),
                },
            ],
        });

        RenderBindingSet { bind_group, generation }
    }

    /// Updates the comparison uniforms in place
    pub fn write_comparison(&self, queue: &wgpu::Queue, compare_on: bool, split: f32) {
        queue.write_buffer(&self.compare_buffer, 0, bytemuck::bytes_of(&(compare_on as u32)));
        queue.write_buffer(&self.split_buffer, 0, bytemuck::bytes_of(&split));
    }

    /// Draws the full-screen quad into `view`
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, bindings: &RenderBindingSet, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Compositor pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bindings.bind_group, &[]);
        render_pass.draw(0..6, 0..1);
    }

    pub fn release(self) {
        self.compare_buffer.destroy();
        self.split_buffer.destroy();
    }
}

/// Both halves of a comparison are filtered linearly when scaled to the target
fn sampler_descriptor() -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("Compositor sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_off_is_processed_everywhere() {
        for x in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_eq!(comparison_source(x, false, 0.5), ComparisonSource::Processed);
            assert_eq!(comparison_source(x, false, 0.0), ComparisonSource::Processed);
        }
    }

    #[test]
    fn split_at_half() {
        assert_eq!(comparison_source(0.25, true, 0.5), ComparisonSource::Raw);
        assert_eq!(comparison_source(0.4985, true, 0.5), ComparisonSource::Raw);
        assert_eq!(comparison_source(0.4995, true, 0.5), ComparisonSource::Marker);
        assert_eq!(comparison_source(0.5, true, 0.5), ComparisonSource::Marker);
        assert_eq!(comparison_source(0.5005, true, 0.5), ComparisonSource::Marker);
        assert_eq!(comparison_source(0.5015, true, 0.5), ComparisonSource::Processed);
        assert_eq!(comparison_source(0.9, true, 0.5), ComparisonSource::Processed);
    }

    #[test]
    fn split_at_edges() {
        assert_eq!(comparison_source(0.0, true, 0.0), ComparisonSource::Marker);
        assert_eq!(comparison_source(0.5, true, 0.0), ComparisonSource::Processed);
        assert_eq!(comparison_source(0.5, true, 1.0), ComparisonSource::Raw);
    }

    #[test]
    fn sampler_filters_linearly() {
        let descriptor = sampler_descriptor();
        assert_eq!(descriptor.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.address_mode_u, wgpu::AddressMode::ClampToEdge);
    }
}
