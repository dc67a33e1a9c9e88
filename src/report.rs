//! JSON report of a finished pass.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::export::clip_file_name;
use crate::frame::StreamInfo;
use crate::pipeline::{PassOptions, PassStats, PassSummary};
use crate::segment::{Rally, SegmentationConfig};

pub const REPORT_FILE_NAME: &str = "rallies.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RallyReport {
    pub source: String,
    pub stream: StreamInfo,
    pub stats: PassStats,
    pub classifier: ClassifierConfig,
    pub segmentation: SegmentationConfig,
    pub rallies: Vec<RallyEntry>,
}

/// One rally as written to the report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RallyEntry {
    pub clip: String,
    #[serde(flatten)]
    pub rally: Rally,
    pub duration_secs: f64,
}

impl RallyReport {
    pub fn from_summary(summary: &PassSummary, opts: &PassOptions) -> Self {
        Self {
            source: summary.source.clone(),
            stream: summary.info,
            stats: summary.stats,
            classifier: opts.classifier,
            segmentation: opts.segmentation,
            rallies: entries(&summary.rallies),
        }
    }

    pub fn total_rally_secs(&self) -> f64 {
        self.rallies.iter().map(|entry| entry.duration_secs).sum()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize rally report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read report {}: {}", path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| anyhow!("invalid report {}: {}", path.display(), e))
    }
}

/// Number rallies in output order.
pub fn entries(rallies: &[Rally]) -> Vec<RallyEntry> {
    rallies
        .iter()
        .enumerate()
        .map(|(index, rally)| RallyEntry {
            clip: clip_file_name(index),
            rally: *rally,
            duration_secs: rally.duration_secs(),
        })
        .collect()
}

/// Plain-text listing, one rally per line.
pub fn render_rallies(rallies: &[Rally]) -> String {
    if rallies.is_empty() {
        return "no rallies found\n".to_string();
    }
    let mut out = String::new();
    for (index, rally) in rallies.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:>8.2}s - {:>8.2}s  ({:.2}s, frames {}..{})",
            index + 1,
            rally.start_secs,
            rally.end_secs,
            rally.duration_secs(),
            rally.start_frame,
            rally.end_frame
        );
    }
    out
}
