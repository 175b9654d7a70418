//! GPU device acquisition and the render target it presents to

use crate::{FrameError, SessionError};

/// Pixel format of offscreen render targets
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where composited frames go
pub enum SurfaceRequest {
    /// A presentable surface such as a window or canvas
    Window { target: wgpu::SurfaceTarget<'static>, size: (u32, u32) },
    /// A texture that can be read back, for headless rendering and tests
    Offscreen { size: (u32, u32) },
}

enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        configuration: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
    Released,
}

/// A frame acquired from the render target, to be drawn into and then presented
pub enum TargetFrame {
    Surface(wgpu::SurfaceTexture),
    Offscreen(wgpu::Texture),
}

impl TargetFrame {
    /// Creates a view in the render format of the target
    pub fn view(&self, format: wgpu::TextureFormat) -> wgpu::TextureView {
        let texture = match self {
            TargetFrame::Surface(surface_texture) => &surface_texture.texture,
            TargetFrame::Offscreen(texture) => texture,
        };
        texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(format),
            ..Default::default()
        })
    }
}

/// GPU device, queue and the render target bound to them
pub struct DeviceContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

fn create_offscreen_texture(device: &wgpu::Device, size: (u32, u32)) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

impl DeviceContext {
    /// Requests an adapter and device and binds the requested render target to them
    ///
    /// Fails without retrying when no adapter or device is available, or when the adapter
    /// cannot filter 32-bit float textures.
    pub async fn acquire(request: SurfaceRequest) -> Result<Self, SessionError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let (surface, size) = match request {
            SurfaceRequest::Window { target, size } => (Some(instance.create_surface(target)?), size),
            SurfaceRequest::Offscreen { size } => (None, size),
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await?;

        tracing::info!(adapter = ?adapter.get_info(), "GPU adapter acquired");

        let required_features = wgpu::Features::FLOAT32_FILTERABLE;
        if !adapter.features().contains(required_features) {
            return Err(SessionError::MissingFeatures(required_features - adapter.features()));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vidgpu device"),
                required_features,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await?;

        let (target, format) = match surface {
            Some(surface) => {
                let capabilities = surface.get_capabilities(&adapter);
                let surface_format = *capabilities.formats.first().ok_or(SessionError::IncompatibleSurface)?;

                let alpha_mode = if capabilities.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
                    wgpu::CompositeAlphaMode::PreMultiplied
                } else {
                    let fallback = capabilities.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);
                    tracing::warn!(?fallback, "premultiplied alpha is not supported by the surface");
                    fallback
                };

                let configuration = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format: surface_format,
                    width: size.0.max(1),
                    height: size.1.max(1),
                    present_mode: wgpu::PresentMode::Fifo,
                    alpha_mode,
                    view_formats: vec![surface_format.remove_srgb_suffix()],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&device, &configuration);

                (RenderTarget::Surface { surface, configuration }, surface_format.remove_srgb_suffix())
            }
            None => (
                RenderTarget::Offscreen {
                    texture: create_offscreen_texture(&device, size),
                },
                OFFSCREEN_FORMAT,
            ),
        };

        Ok(Self {
            adapter,
            device,
            queue,
            target,
            format,
            size,
        })
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Format compositor pipelines must render in
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// The offscreen texture, if this context renders offscreen
    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match &self.target {
            RenderTarget::Offscreen { texture } => Some(texture),
            _ => None,
        }
    }

    /// Resizes the render target, e.g. to match a new pipeline output
    pub fn resize(&mut self, size: (u32, u32)) {
        if size == self.size || size.0 == 0 || size.1 == 0 {
            return;
        }
        self.size = size;

        match &mut self.target {
            RenderTarget::Surface { surface, configuration } => {
                configuration.width = size.0;
                configuration.height = size.1;
                surface.configure(&self.device, configuration);
            }
            RenderTarget::Offscreen { texture } => {
                texture.destroy();
                *texture = create_offscreen_texture(&self.device, size);
            }
            RenderTarget::Released => {}
        }
        tracing::debug!(width = size.0, height = size.1, "render target resized");
    }

    pub fn acquire_frame(&mut self) -> Result<TargetFrame, FrameError> {
        match &self.target {
            RenderTarget::Surface { surface, configuration } => match surface.get_current_texture() {
                Ok(surface_texture) => Ok(TargetFrame::Surface(surface_texture)),
                Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    surface.configure(&self.device, configuration);
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            },
            RenderTarget::Offscreen { texture } => Ok(TargetFrame::Offscreen(texture.clone())),
            RenderTarget::Released => Err(FrameError::Surface(wgpu::SurfaceError::Lost)),
        }
    }

    pub fn present(&self, frame: TargetFrame) {
        if let TargetFrame::Surface(surface_texture) = frame {
            surface_texture.present();
        }
    }

    /// Unbinds the render target; safe to call more than once
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.target, RenderTarget::Released) {
            RenderTarget::Offscreen { texture } => texture.destroy(),
            RenderTarget::Surface { .. } | RenderTarget::Released => {}
        }
    }
}
