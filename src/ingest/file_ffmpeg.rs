//! Local file frame source using FFmpeg.
//!
//! Frames are decoded in stream order and converted to packed RGB24 in-memory.
//! The decoder is drained at end of file so trailing frames are not lost.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::{StreamInfo, VideoFrame};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: StreamInfo,
    frame_count: u64,
    eof_sent: bool,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();

        let fps = rational_to_f64(input_stream.avg_frame_rate())
            .or_else(|| rational_to_f64(input_stream.rate()))
            .ok_or_else(|| anyhow::anyhow!("file reports no usable frame rate"))?;
        let reported_frames = input_stream.frames();

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let frame_count = if reported_frames > 0 {
            reported_frames as usize
        } else {
            // Container did not record a count; estimate from duration.
            let secs = input.duration().max(0) as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
            (secs * fps).round() as usize
        };

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

        let info = StreamInfo {
            fps,
            frame_count,
            width: decoder.width(),
            height: decoder.height(),
        };

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            info,
            frame_count: 0,
            eof_sent: false,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: connected to {} (ffmpeg) {}x{} @ {:.3} fps, ~{} frames",
            self.config.path,
            self.info.width,
            self.info.height,
            self.info.fps,
            self.info.frame_count
        );
        Ok(())
    }

    pub(crate) fn info(&self) -> StreamInfo {
        self.info
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                if let Err(e) = self.decoder.send_packet(&packet) {
                    self.last_error = Some(e.to_string());
                    return Err(e).context("send packet to ffmpeg decoder");
                }
                sent = true;
                break;
            }

            if !sent {
                self.decoder
                    .send_eof()
                    .context("flush ffmpeg decoder at end of file")?;
                self.eof_sent = true;
            }
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            path: self.config.path.clone(),
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<VideoFrame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;

        let index = self.frame_count as usize;
        self.frame_count += 1;
        Ok(VideoFrame::new(pixels, index, width, height))
    }
}

fn rational_to_f64(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(f64::from(rate))
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
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
