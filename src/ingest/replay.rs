//! Recorded detections as JSON Lines.
//!
//! The first line is a header carrying the stream metadata, followed by one
//! record per processed frame:
//!
//! ```text
//! {"version":1,"stream":{"fps":30.0,"frame_count":900,"width":1920,"height":1080}}
//! {"frame":0,"candidates":[]}
//! {"frame":1,"candidates":[{"bbox":{"x1":..,"y1":..,"x2":..,"y2":..},"class":"object","confidence":0.4}]}
//! ```
//!
//! Replaying a recording lets thresholds be tuned without re-running inference.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::source::{DetectionSource, FrameDetections};
use crate::classify::FrameReport;
use crate::detect::{Candidate, DetectionResult};
use crate::frame::StreamInfo;
use crate::pipeline::PassObserver;

const REPLAY_VERSION: u32 = 1;
/// How far past the header's frame count a record may point. Container frame
/// counts are estimates, so a recording can run a little longer.
const FRAME_OVERRUN_SECS: f64 = 300.0;

#[derive(Debug, Serialize, Deserialize)]
struct ReplayHeader {
    version: u32,
    stream: StreamInfo,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReplayFrame {
    frame: usize,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Detection source backed by a JSON Lines recording.
pub struct ReplaySource {
    path: PathBuf,
    info: StreamInfo,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    last_index: Option<usize>,
    max_index: usize,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| anyhow!("failed to open replay {}: {}", path.display(), e))?;
        let mut lines = BufReader::new(file).lines();
        let header_line = lines
            .next()
            .ok_or_else(|| anyhow!("replay {} is empty", path.display()))?
            .with_context(|| format!("read replay header from {}", path.display()))?;
        let header: ReplayHeader = serde_json::from_str(&header_line)
            .map_err(|e| anyhow!("invalid replay header in {}: {}", path.display(), e))?;
        if header.version != REPLAY_VERSION {
            return Err(anyhow!(
                "unsupported replay version {} in {} (expected {})",
                header.version,
                path.display(),
                REPLAY_VERSION
            ));
        }
        log::info!(
            "ReplaySource: opened {} @ {:.3} fps, {} frames",
            path.display(),
            header.stream.fps,
            header.stream.frame_count
        );
        let max_index = header
            .stream
            .frame_count
            .saturating_add(header.stream.frames_for(FRAME_OVERRUN_SECS));
        Ok(Self {
            path,
            info: header.stream,
            lines,
            line_no: 1,
            last_index: None,
            max_index,
        })
    }
}

impl DetectionSource for ReplaySource {
    fn describe(&self) -> String {
        format!("{} (replay)", self.path.display())
    }

    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn next_detections(&mut self) -> Result<Option<FrameDetections>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("read replay {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayFrame = serde_json::from_str(&line).map_err(|e| {
                anyhow!(
                    "invalid replay record at {}:{}: {}",
                    self.path.display(),
                    self.line_no,
                    e
                )
            })?;
            if let Some(last) = self.last_index {
                if record.frame <= last {
                    return Err(anyhow!(
                        "replay frames out of order at {}:{} (frame {} after {})",
                        self.path.display(),
                        self.line_no,
                        record.frame,
                        last
                    ));
                }
            }
            if record.frame > self.max_index {
                return Err(anyhow!(
                    "replay frame {} at {}:{} is beyond the recorded stream ({} frames)",
                    record.frame,
                    self.path.display(),
                    self.line_no,
                    self.info.frame_count
                ));
            }
            self.last_index = Some(record.frame);
            return Ok(Some(FrameDetections {
                index: record.frame,
                detections: DetectionResult::new(record.candidates),
            }));
        }
        Ok(None)
    }
}

/// Pass observer that records every frame's detections for later replay.
pub struct ReplayRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ReplayRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| anyhow!("failed to create replay {}: {}", path.display(), e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)
            .with_context(|| format!("write replay {}", self.path.display()))?;
        self.writer
            .write_all(b"\n")
            .with_context(|| format!("write replay {}", self.path.display()))
    }
}

impl PassObserver for ReplayRecorder {
    fn on_start(&mut self, info: &StreamInfo) -> Result<()> {
        self.write_line(&ReplayHeader {
            version: REPLAY_VERSION,
            stream: *info,
        })
    }

    fn on_frame(&mut self, frame: &FrameDetections, _report: &FrameReport) -> Result<()> {
        self.write_line(&ReplayFrame {
            frame: frame.index,
            candidates: frame.detections.candidates.clone(),
        })
    }

    fn on_finish(&mut self, _frames_processed: usize) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("flush replay {}", self.path.display()))
    }
}
