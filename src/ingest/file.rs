//! Local file frame source.
//!
//! `FileSource` decodes frames from a local video file in stream order. Paths
//! starting with `stub://` produce synthetic frames for tests and demos; every
//! other local path needs the `ingest-file-ffmpeg` feature.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{StreamInfo, VideoFrame};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "match.mp4") or `stub://<name>`.
    pub path: String,
    /// Frame rate reported by synthetic sources.
    pub synthetic_fps: f64,
    /// Number of frames produced by synthetic sources.
    pub synthetic_frames: usize,
    pub synthetic_width: u32,
    pub synthetic_height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            synthetic_fps: 30.0,
            synthetic_frames: 300,
            synthetic_width: 640,
            synthetic_height: 360,
        }
    }
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "video decoding requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Connect to the file source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Frame rate, frame count and geometry of the stream.
    pub fn info(&self) -> StreamInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
        }
    }

    /// Decode the next frame; `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_decoded: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: usize,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        if !(config.synthetic_fps.is_finite() && config.synthetic_fps > 0.0) {
            return Err(anyhow!("synthetic fps must be positive"));
        }
        Ok(Self {
            config,
            frame_count: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            fps: self.config.synthetic_fps,
            frame_count: self.config.synthetic_frames,
            width: self.config.synthetic_width,
            height: self.config.synthetic_height,
        }
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.frame_count >= self.config.synthetic_frames {
            return Ok(None);
        }
        let index = self.frame_count;
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels(index);
        Ok(Some(VideoFrame::new(
            pixels,
            index,
            self.config.synthetic_width,
            self.config.synthetic_height,
        )))
    }

    fn generate_synthetic_pixels(&self, index: usize) -> Vec<u8> {
        let pixel_count =
            self.config.synthetic_width as usize * self.config.synthetic_height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i + index) % 256) as u8;
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count as u64,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
