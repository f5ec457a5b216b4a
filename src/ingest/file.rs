//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file (ffmpeg backend, behind
//! the `ingest-file-ffmpeg` feature) or synthesizes them for `stub://` paths.
//! Remote URL schemes are rejected. `next_frame` returns `Ok(None)` once the
//! source is exhausted.
//!
//! Synthetic paths take an optional frame limit: `stub://parking_lot?frames=25`.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g. "clips/entrance.mp4") or a `stub://` name.
    pub path: String,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
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
                "file ingestion only supports local paths (no URL schemes), got '{}'",
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
                    "video file '{}' requires the ingest-file-ffmpeg feature",
                    config.path
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

    /// Decode the next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
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
    limit: Option<u64>,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let limit = parse_frame_limit(&config.path)?;
        Ok(Self {
            config,
            limit,
            frame_count: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.map_or(false, |limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Ok(Some(Frame::new(index, synthetic_scene(index))))
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

/// Grey road with a red block drifting left to right.
fn synthetic_scene(index: u64) -> RgbImage {
    let block_w = SYNTHETIC_WIDTH / 4;
    let block_h = SYNTHETIC_HEIGHT / 4;
    let travel = (SYNTHETIC_WIDTH - block_w) as u64;
    let x0 = ((index * 8) % travel) as u32;
    let y0 = SYNTHETIC_HEIGHT / 2;
    RgbImage::from_fn(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, |x, y| {
        if x >= x0 && x < x0 + block_w && y >= y0 && y < y0 + block_h {
            Rgb([200, 20, 20])
        } else {
            Rgb([96, 96, 96])
        }
    })
}

fn parse_frame_limit(path: &str) -> Result<Option<u64>> {
    let Some((_, query)) = path.split_once('?') else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let frames = value
                .parse()
                .map_err(|_| anyhow!("invalid frame count '{}' in '{}'", value, path))?;
            return Ok(Some(frames));
        }
    }
    Ok(None)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_and_empty_paths() {
        assert!(FileSource::new(FileConfig::new("rtsp://camera/1")).is_err());
        assert!(FileSource::new(FileConfig::new("https://host/clip.mp4")).is_err());
        assert!(FileSource::new(FileConfig::new("  ")).is_err());
    }

    #[test]
    fn synthetic_source_stops_at_frame_limit() {
        let mut source = FileSource::new(FileConfig::new("stub://lot?frames=3")).unwrap();
        source.connect().unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.width(), SYNTHETIC_WIDTH);
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.stats().frames_decoded, 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn synthetic_source_without_limit_keeps_going() {
        let mut source = FileSource::new(FileConfig::new("stub://lot")).unwrap();
        for _ in 0..5 {
            assert!(source.next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn bad_frame_limit_is_an_error() {
        assert!(FileSource::new(FileConfig::new("stub://lot?frames=many")).is_err());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn video_files_need_ffmpeg_feature() {
        let err = FileSource::new(FileConfig::new("clip.mp4")).err().unwrap();
        assert!(err.to_string().contains("ingest-file-ffmpeg"));
    }
}
