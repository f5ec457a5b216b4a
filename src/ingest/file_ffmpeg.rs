//! Local file frame source using FFmpeg.
//!
//! Packets of the best video stream are decoded and scaled to RGB24 in memory.
//! The decoder is flushed once the container runs out of packets, so trailing
//! frames are not lost.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video file '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", config.path))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: connected to {} (ffmpeg, {}x{})",
            self.config.path,
            self.decoder.width(),
            self.decoder.height()
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.receive()? {
            return Ok(Some(frame));
        }

        while !self.eof_sent {
            let Some((stream, packet)) = self.input.packets().next() else {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.eof_sent = true;
                break;
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
        }

        self.receive()
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            path: self.config.path.clone(),
        }
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;

        let index = self.frame_count;
        self.frame_count += 1;
        Frame::from_rgb_pixels(index, pixels, width, height).map(Some)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
