//! Clip export through the `ffmpeg` command-line tool.
//!
//! Each rally is cut from the source with stream copy (no re-encode):
//!
//! ```text
//! ffmpeg -y -ss <start> -i <input> -t <duration> -c copy -loglevel error <output>
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

use crate::segment::Rally;

pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";

/// Builder for a single stream-copy trim.
#[derive(Clone, Debug)]
pub struct ClipCommand {
    input: PathBuf,
    output: PathBuf,
    start_secs: f64,
    duration_secs: f64,
    log_level: String,
}

impl ClipCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            start_secs: 0.0,
            duration_secs: 0.0,
            log_level: "error".to_string(),
        }
    }

    /// Trim to `[start, end)` in seconds.
    pub fn range(mut self, start_secs: f64, end_secs: f64) -> Self {
        self.start_secs = start_secs.max(0.0);
        self.duration_secs = (end_secs - self.start_secs).max(0.0);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the ffmpeg argument list (without the program name).
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.2}", self.start_secs),
            "-i".to_string(),
            self.input.to_string_lossy().into_owned(),
            "-t".to_string(),
            format!("{:.2}", self.duration_secs),
            "-c".to_string(),
            "copy".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            self.output.to_string_lossy().into_owned(),
        ]
    }
}

/// Writes one clip per rally into an output directory.
#[derive(Clone, Debug)]
pub struct ClipExporter {
    ffmpeg_bin: PathBuf,
    output_dir: PathBuf,
}

impl ClipExporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            ffmpeg_bin: PathBuf::from(DEFAULT_FFMPEG_BIN),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Use a specific ffmpeg executable.
    pub fn with_ffmpeg(mut self, bin: impl AsRef<Path>) -> Self {
        self.ffmpeg_bin = bin.as_ref().to_path_buf();
        self
    }

    /// Output path for the rally at zero-based position `index`.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(clip_file_name(index))
    }

    /// Command that would produce the clip for `rally` at position `index`.
    pub fn command_for(&self, input: &Path, index: usize, rally: &Rally) -> ClipCommand {
        ClipCommand::new(input, self.clip_path(index)).range(rally.start_secs, rally.end_secs)
    }

    /// Export every rally in order.
    ///
    /// A failing clip does not stop the remaining ones; the call fails at the
    /// end if any clip could not be written.
    pub fn export_all(&self, input: &Path, rallies: &[Rally]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create output dir {}", self.output_dir.display())
        })?;

        let mut written = Vec::with_capacity(rallies.len());
        let mut failures = 0usize;
        for (index, rally) in rallies.iter().enumerate() {
            let cmd = self.command_for(input, index, rally);
            match self.run(&cmd) {
                Ok(()) => {
                    log::info!(
                        "clip {} written: {:.2}s-{:.2}s -> {}",
                        index + 1,
                        rally.start_secs,
                        rally.end_secs,
                        cmd.output().display()
                    );
                    written.push(cmd.output().to_path_buf());
                }
                Err(e) => {
                    log::error!("clip {} failed: {:#}", index + 1, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(anyhow!(
                "{} of {} clips failed to export",
                failures,
                rallies.len()
            ));
        }
        Ok(written)
    }

    fn run(&self, cmd: &ClipCommand) -> Result<()> {
        let output = Command::new(&self.ffmpeg_bin)
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn {}", self.ffmpeg_bin.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.ffmpeg_bin.display(),
                output.status,
                stderr.trim()
            ));
        }
        Ok(())
    }
}

/// `rally_01.mp4`, `rally_02.mp4`, ... for zero-based `index`.
pub fn clip_file_name(index: usize) -> String {
    format!("rally_{:02}.mp4", index + 1)
}
