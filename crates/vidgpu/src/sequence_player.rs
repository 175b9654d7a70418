//! A native [`MediaPlayer`] that plays a still image or a directory of frames at a fixed rate

use std::{
    future::Future,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use bytes::Bytes;

use crate::{
    FrameError, FrameSourceError,
    frame_source::{MediaPlayer, PlaybackState, SourceRef},
    ingest::write_rgba8_frame,
};

/// Wall-clock playback position that excludes time spent paused
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    start: Instant,
    paused_at: Option<Instant>,
    total_pause: Duration,
}

impl PlaybackClock {
    pub fn new(start_paused: bool) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            paused_at: start_paused.then_some(now),
            total_pause: Duration::ZERO,
        }
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.total_pause += paused_at.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        let current_pause = self.paused_at.map_or(Duration::ZERO, |paused_at| paused_at.elapsed());
        self.start.elapsed().saturating_sub(self.total_pause + current_pause)
    }
}

/// Decoded RGBA8 frames played back at `fps`
#[derive(Debug)]
pub struct FrameSequencePlayer {
    fps: u32,
    frames: Vec<Bytes>,
    dimensions: Option<(u32, u32)>,
    clock: Option<PlaybackClock>,
    state: PlaybackState,
    muted: bool,
    looping: bool,
    presented: u64,
    /// Frames presented before the last restart from the end
    restart_base: u64,
}

impl FrameSequencePlayer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frames: Vec::new(),
            dimensions: None,
            clock: None,
            state: PlaybackState::Paused,
            muted: false,
            looping: false,
            presented: 0,
            restart_base: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Index of the frame [`MediaPlayer::copy_current_frame`] would upload
    pub fn current_frame_index(&self) -> usize {
        match self.frames.len() {
            0 => 0,
            len => (self.presented.saturating_sub(self.restart_base + 1) % len as u64) as usize,
        }
    }

    fn frame_paths(path: &Path) -> Result<Vec<PathBuf>, FrameSourceError> {
        if !path.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && image::ImageFormat::from_path(&entry_path).is_ok() {
                paths.push(entry_path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn decode(path: &Path) -> Result<((u32, u32), Vec<Bytes>), FrameSourceError> {
        let paths = Self::frame_paths(path)?;
        if paths.is_empty() {
            return Err(FrameSourceError::Decode(format!("no image frames found in {}", path.display())));
        }

        let mut dimensions = None;
        let mut frames = Vec::with_capacity(paths.len());
        for frame_path in &paths {
            let frame = image::open(frame_path)?.to_rgba8();
            let size = frame.dimensions();
            match dimensions {
                None => dimensions = Some(size),
                Some(expected) if expected != size => {
                    return Err(FrameSourceError::Decode(format!(
                        "{} is {}x{}, expected {}x{}",
                        frame_path.display(),
                        size.0,
                        size.1,
                        expected.0,
                        expected.1
                    )));
                }
                Some(_) => {}
            }
            frames.push(Bytes::from(frame.into_raw()));
        }

        tracing::debug!(frames = frames.len(), source = %path.display(), "frame sequence decoded");
        Ok((dimensions.unwrap_or_default(), frames))
    }
}

impl MediaPlayer for FrameSequencePlayer {
    type File = PathBuf;

    fn load(&mut self, source: &SourceRef<PathBuf>) -> Result<(), FrameSourceError> {
        let path = match source {
            SourceRef::File(path) => path,
            SourceRef::Url(url) => return Err(FrameSourceError::Decode(format!("cannot stream {url}: only local files are supported"))),
        };

        let (dimensions, frames) = Self::decode(path)?;
        self.frames = frames;
        self.dimensions = Some(dimensions);
        self.clock = None;
        self.state = PlaybackState::Paused;
        self.presented = 0;
        self.restart_base = 0;
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn play(&mut self) -> impl Future<Output = Result<(), FrameSourceError>> {
        let result = if self.frames.is_empty() {
            Err(FrameSourceError::NoSource)
        } else {
            let restart = self.state == PlaybackState::Ended;
            match self.clock.as_mut() {
                Some(clock) if !restart => clock.resume(),
                _ => self.clock = Some(PlaybackClock::new(false)),
            }
            if restart {
                self.restart_base = self.presented;
            }
            self.state = PlaybackState::Playing;
            Ok(())
        };
        std::future::ready(result)
    }

    fn pause(&mut self) {
        if let Some(clock) = self.clock.as_mut() {
            clock.pause();
        }
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn presented_frames(&mut self) -> u64 {
        if self.state != PlaybackState::Playing || self.frames.is_empty() {
            return self.presented;
        }
        let Some(clock) = self.clock.as_ref() else {
            return self.presented;
        };

        let frame_number = (clock.elapsed().as_secs_f64() * self.fps as f64) as u64;
        let len = self.frames.len() as u64;
        let frame_number = if !self.looping && frame_number >= len {
            self.state = PlaybackState::Ended;
            len - 1
        } else {
            frame_number
        };
        self.presented = self.presented.max(self.restart_base + frame_number + 1);
        self.presented
    }

    fn copy_current_frame(&mut self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<(), FrameError> {
        let (width, height) = self.dimensions.ok_or_else(|| FrameError::Ingest("no frames loaded".to_string()))?;
        let frame = self
            .frames
            .get(self.current_frame_index())
            .ok_or_else(|| FrameError::Ingest("no frames loaded".to_string()))?;
        write_rgba8_frame(queue, texture, width, height, frame)
    }

    fn close(&mut self) {
        self.frames.clear();
        self.dimensions = None;
        self.clock = None;
        self.state = PlaybackState::Paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vidgpu-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_frame(path: &Path, width: u32, height: u32, value: u8) {
        image::RgbaImage::from_pixel(width, height, image::Rgba([value, value, value, 255])).save(path).unwrap();
    }

    #[test]
    fn clock_excludes_paused_time() {
        let mut clock = PlaybackClock::new(true);
        assert!(clock.is_paused());
        std::thread::sleep(Duration::from_millis(20));
        assert!(clock.elapsed() < Duration::from_millis(5));

        clock.resume();
        assert!(!clock.is_paused());
        std::thread::sleep(Duration::from_millis(20));
        assert!(clock.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn loads_directory_in_name_order() {
        let dir = temp_dir("ordered");
        write_frame(&dir.join("002.png"), 4, 2, 20);
        write_frame(&dir.join("001.png"), 4, 2, 10);
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut player = FrameSequencePlayer::new(30);
        player.load(&SourceRef::File(dir.clone())).unwrap();
        assert_eq!(player.frame_count(), 2);
        assert_eq!(player.video_dimensions(), Some((4, 2)));
        assert_eq!(player.frames[0][0], 10);
        assert_eq!(player.frames[1][0], 20);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_mismatched_frame_sizes() {
        let dir = temp_dir("mismatched");
        write_frame(&dir.join("a.png"), 4, 4, 0);
        write_frame(&dir.join("b.png"), 8, 4, 0);

        let mut player = FrameSequencePlayer::new(30);
        assert!(matches!(player.load(&SourceRef::File(dir.clone())), Err(FrameSourceError::Decode(_))));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_urls() {
        let mut player = FrameSequencePlayer::new(30);
        let result = player.load(&SourceRef::Url("https://example.com/video.mp4".to_string()));
        assert!(matches!(result, Err(FrameSourceError::Decode(_))));
    }

    #[test]
    fn paused_player_presents_nothing_new() {
        let dir = temp_dir("paused");
        let frame = dir.join("still.png");
        write_frame(&frame, 2, 2, 0);

        let mut player = FrameSequencePlayer::new(1000);
        player.load(&SourceRef::File(frame)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(player.presented_frames(), 0);

        pollster::block_on(player.play()).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(player.presented_frames() >= 1);
        assert_eq!(player.state(), PlaybackState::Ended);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn looping_player_keeps_presenting() {
        let dir = temp_dir("looping");
        write_frame(&dir.join("0.png"), 2, 2, 0);
        write_frame(&dir.join("1.png"), 2, 2, 255);

        let mut player = FrameSequencePlayer::new(1000);
        player.set_looping(true);
        player.load(&SourceRef::File(dir.clone())).unwrap();
        pollster::block_on(player.play()).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(player.presented_frames() > 2);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!(player.current_frame_index() < 2);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
