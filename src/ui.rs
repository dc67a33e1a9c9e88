use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use anyhow::Result;
use rally_splitter::classify::FrameReport;
use rally_splitter::frame::StreamInfo;
use rally_splitter::ingest::FrameDetections;
use rally_splitter::pipeline::PassObserver;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal feedback for the CLI: stage banners and a frame progress bar.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Pass observer that draws a per-frame progress bar in pretty mode.
    pub fn frame_progress(&self) -> FrameProgress {
        FrameProgress {
            enabled: self.pretty(),
            bar: None,
            cuts: 0,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct FrameProgress {
    enabled: bool,
    bar: Option<ProgressBar>,
    cuts: usize,
}

impl PassObserver for FrameProgress {
    fn on_start(&mut self, info: &StreamInfo) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let bar = ProgressBar::new(info.frame_count as u64);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({per_sec}, eta {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        self.bar = Some(bar);
        Ok(())
    }

    fn on_frame(&mut self, _frame: &FrameDetections, report: &FrameReport) -> Result<()> {
        if let Some(bar) = &self.bar {
            if report.outcome.is_teleport() {
                self.cuts += 1;
                bar.set_message(format!("{} cuts", self.cuts));
            }
            bar.inc(1);
        }
        Ok(())
    }

    fn on_finish(&mut self, frames_processed: usize) -> Result<()> {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{frames_processed} frames, {} cuts", self.cuts));
        }
        Ok(())
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
