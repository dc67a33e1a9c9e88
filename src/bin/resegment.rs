//! resegment - split a saved timeline into rallies under new thresholds

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use rally_splitter::config::RallyConfig;
use rally_splitter::report::{entries, render_rallies};
use rally_splitter::segment::segment_timeline;
use rally_splitter::timeline::Timeline;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Timeline written by `rallysplit --save-timeline`.
    timeline: PathBuf,
    /// Config file (TOML, or JSON by extension). Defaults to $RALLY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Gap tolerance in seconds.
    #[arg(long, value_name = "SECS")]
    gap_tolerance: Option<f64>,
    /// Minimum rally duration in seconds.
    #[arg(long, value_name = "SECS")]
    min_duration: Option<f64>,
    /// Close a rally still open at the end of the timeline.
    #[arg(long)]
    flush_at_end: bool,
    /// Write the rally list as JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => RallyConfig::from_path(path)?,
        None => RallyConfig::load()?,
    };
    if let Some(secs) = args.gap_tolerance {
        cfg.segmentation.gap_tolerance_secs = secs;
    }
    if let Some(secs) = args.min_duration {
        cfg.segmentation.min_rally_secs = secs;
    }
    if args.flush_at_end {
        cfg.segmentation.flush_at_end = true;
    }
    cfg.validate()?;

    let timeline = Timeline::load(&args.timeline)?;
    log::info!(
        "loaded {}: {} frames @ {:.3} fps, {} present, {} cuts",
        args.timeline.display(),
        timeline.len(),
        timeline.fps(),
        timeline.present_frames(),
        timeline.cuts().len()
    );

    let rallies = segment_timeline(&timeline, &cfg.segmentation);
    print!("{}", render_rallies(&rallies));

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&entries(&rallies)).context("serialize rallies")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("rallies written to {}", path.display());
    }
    Ok(())
}
