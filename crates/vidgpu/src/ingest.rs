//! Copying decoded video frames into GPU memory

use half::f16;

use crate::{
    FrameError,
    frame_source::{FrameSource, MediaPlayer},
};

/// Format of the texture decoded frames are copied into
pub const VIDEO_FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// GPU texture sized to the source; recreated on a session rebuild, never resized in place
#[derive(Debug)]
pub struct VideoFrameTexture {
    texture: wgpu::Texture,
}

impl VideoFrameTexture {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Video Frame Texture"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: VIDEO_FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self { texture }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

/// Copies the current frame of a source into the video texture when one is needed
#[derive(Debug, Default)]
pub struct FrameIngestor {
    forced: bool,
}

impl FrameIngestor {
    /// Makes the next [`FrameIngestor::ingest`] copy even if the source is paused
    pub fn request_forced_copy(&mut self) {
        self.forced = true;
    }

    pub fn has_forced_copy(&self) -> bool {
        self.forced
    }

    /// Returns whether a frame was copied
    ///
    /// Paused sources are skipped unless a forced copy is pending. The forced flag is
    /// consumed by the attempt, successful or not.
    pub fn ingest<P: MediaPlayer>(&mut self, source: &mut FrameSource<P>, target: &VideoFrameTexture, queue: &wgpu::Queue) -> Result<bool, FrameError> {
        if !source.is_playing() && !self.forced {
            return Ok(false);
        }
        self.forced = false;

        let source_size = source.current_dimensions();
        let texture_size = target.size();
        if source_size != texture_size {
            return Err(FrameError::DimensionMismatch { source_size, texture_size });
        }

        source.copy_frame_into(queue, target.texture())?;
        Ok(true)
    }
}

/// Converts tightly packed 8-bit RGBA pixels to half floats in [0, 1]
pub fn rgba8_to_f16(rgba: &[u8]) -> Vec<f16> {
    rgba.iter().map(|&channel| f16::from_f32(channel as f32 / 255.0)).collect()
}

/// Uploads an 8-bit RGBA frame into an [`VIDEO_FRAME_FORMAT`] texture of the same size
pub fn write_rgba8_frame(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, rgba: &[u8]) -> Result<(), FrameError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(FrameError::Ingest(format!("expected {expected} bytes for a {width}x{height} frame, got {}", rgba.len())));
    }
    if (texture.width(), texture.height()) != (width, height) {
        return Err(FrameError::DimensionMismatch {
            source_size: (width, height),
            texture_size: (texture.width(), texture.height()),
        });
    }

    let pixels = rgba8_to_f16(rgba);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&pixels),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4 * 2), // 4 components * 2 bytes per f16
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame_source::{PlaybackState, SourceRef},
        settings::FrameRequestMode,
        test_support::{ScriptedPlayer, test_device},
    };

    #[test]
    fn converts_channels_to_unit_range() {
        let pixels = rgba8_to_f16(&[0, 255, 128, 51]);
        assert_eq!(pixels[0], f16::ZERO);
        assert_eq!(pixels[1], f16::ONE);
        assert!((pixels[2].to_f32() - 0.502).abs() < 0.001);
        assert!((pixels[3].to_f32() - 0.2).abs() < 0.001);
    }

    fn source(dimensions: Option<(u32, u32)>) -> FrameSource<ScriptedPlayer> {
        FrameSource::open(
            ScriptedPlayer::new(dimensions),
            &SourceRef::Url("https://example.com/video.mp4".to_string()),
            FrameRequestMode::VideoFrameCallback,
        )
        .unwrap()
    }

    #[test]
    fn paused_source_is_skipped() {
        let Some((device, queue)) = test_device() else {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            return;
        };
        let texture = VideoFrameTexture::new(&device, (16, 8));
        let mut source = source(Some((16, 8)));
        let mut ingestor = FrameIngestor::default();

        assert!(!ingestor.ingest(&mut source, &texture, &queue).unwrap());
        assert_eq!(source.player().copies, 0);
    }

    #[test]
    fn forced_copy_is_one_shot() {
        let Some((device, queue)) = test_device() else {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            return;
        };
        let texture = VideoFrameTexture::new(&device, (16, 8));
        let mut source = source(Some((16, 8)));
        let mut ingestor = FrameIngestor::default();

        ingestor.request_forced_copy();
        assert!(ingestor.has_forced_copy());
        assert!(ingestor.ingest(&mut source, &texture, &queue).unwrap());
        assert!(!ingestor.has_forced_copy());
        assert!(!ingestor.ingest(&mut source, &texture, &queue).unwrap());
        assert_eq!(source.player().copies, 1);
    }

    #[test]
    fn playing_source_copies_every_cycle() {
        let Some((device, queue)) = test_device() else {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            return;
        };
        let texture = VideoFrameTexture::new(&device, (16, 8));
        let mut source = source(Some((16, 8)));
        source.player_mut().state = PlaybackState::Playing;
        let mut ingestor = FrameIngestor::default();

        for _ in 0..3 {
            assert!(ingestor.ingest(&mut source, &texture, &queue).unwrap());
        }
        assert_eq!(source.player().copies, 3);
    }

    #[test]
    fn size_mismatch_is_reported_and_consumes_the_forced_copy() {
        let Some((device, queue)) = test_device() else {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            return;
        };
        let texture = VideoFrameTexture::new(&device, (16, 8));
        let mut source = source(Some((32, 8)));
        let mut ingestor = FrameIngestor::default();

        ingestor.request_forced_copy();
        let result = ingestor.ingest(&mut source, &texture, &queue);
        assert!(matches!(
            result,
            Err(FrameError::DimensionMismatch {
                source_size: (32, 8),
                texture_size: (16, 8),
            })
        ));
        assert!(!ingestor.has_forced_copy());
        assert_eq!(source.player().copies, 0);
    }
}
