//! rallysplit - find rallies in match footage and cut them into clips

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use rally_splitter::config::RallyConfig;
use rally_splitter::detect::{BackendRegistry, StubBackend};
use rally_splitter::export::{ClipExporter, DEFAULT_FFMPEG_BIN};
use rally_splitter::ingest::{
    DetectionSource, FileConfig, FileSource, ReplayRecorder, ReplaySource, VideoDetectionSource,
};
use rally_splitter::pipeline::run_pass;
use rally_splitter::report::{render_rallies, RallyReport, REPORT_FILE_NAME};

#[path = "../ui.rs"]
mod ui;

const TIMELINE_FILE_NAME: &str = "timeline.json";
const DETECTIONS_FILE_NAME: &str = "detections.jsonl";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Match video to scan (`stub://<name>` for a synthetic source).
    input: Option<String>,
    /// Config file (TOML, or JSON by extension). Defaults to $RALLY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read recorded detections instead of running the detector.
    #[arg(long, value_name = "JSONL")]
    detections: Option<PathBuf>,
    /// Write the presence/cut timeline next to the report.
    #[arg(long)]
    save_timeline: bool,
    /// Record every frame's detections for later replay.
    #[arg(long)]
    record_detections: bool,
    /// Skip clip export; only write the report.
    #[arg(long)]
    no_export: bool,
    /// Detector backend name (overrides config).
    #[arg(long)]
    backend: Option<String>,
    /// Gap tolerance in seconds.
    #[arg(long, value_name = "SECS")]
    gap_tolerance: Option<f64>,
    /// Minimum rally duration in seconds.
    #[arg(long, value_name = "SECS")]
    min_duration: Option<f64>,
    /// Teleport threshold in pixels.
    #[arg(long, value_name = "PX")]
    max_jump: Option<f32>,
    /// Close a rally still open at the end of the footage.
    #[arg(long)]
    flush_at_end: bool,
    /// Only scan this many seconds of footage.
    #[arg(long, value_name = "SECS")]
    max_seconds: Option<f64>,
    /// Output directory for clips and the report.
    #[arg(long)]
    out: Option<PathBuf>,
    /// ffmpeg executable used for export.
    #[arg(long, env = "RALLY_FFMPEG", default_value = DEFAULT_FFMPEG_BIN)]
    ffmpeg: PathBuf,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load config");
        resolve_config(&args)?
    };

    let mut source: Box<dyn DetectionSource> = {
        let _stage = ui.stage("Open source");
        open_source(&args, &cfg)?
    };

    let out_dir = cfg.output.dir.clone();
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| anyhow!("failed to create output dir {}: {}", out_dir.display(), e))?;

    let recorder = if args.record_detections {
        Some(ReplayRecorder::create(out_dir.join(DETECTIONS_FILE_NAME))?)
    } else {
        None
    };
    let opts = cfg.pass_options();
    let mut observers = (ui.frame_progress(), recorder);
    let summary = run_pass(source.as_mut(), &opts, &mut observers)?;

    {
        let _stage = ui.stage("Write report");
        if args.save_timeline {
            summary.timeline.save(&out_dir.join(TIMELINE_FILE_NAME))?;
        }
        RallyReport::from_summary(&summary, &opts).write(&out_dir.join(REPORT_FILE_NAME))?;
    }
    print!("{}", render_rallies(&summary.rallies));

    if !cfg.output.export_clips {
        return Ok(());
    }
    let Some(input) = args.input.as_deref().filter(|path| !path.starts_with("stub://")) else {
        log::warn!("no video file to cut clips from; skipping export");
        return Ok(());
    };
    let written = {
        let _stage = ui.stage("Export clips");
        ClipExporter::new(&out_dir)
            .with_ffmpeg(&args.ffmpeg)
            .export_all(Path::new(input), &summary.rallies)?
    };
    println!("{} clips written to {}", written.len(), out_dir.display());
    Ok(())
}

fn resolve_config(args: &Args) -> Result<RallyConfig> {
    let mut cfg = match &args.config {
        Some(path) => RallyConfig::from_path(path)?,
        None => RallyConfig::load()?,
    };
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(secs) = args.gap_tolerance {
        cfg.segmentation.gap_tolerance_secs = secs;
    }
    if let Some(secs) = args.min_duration {
        cfg.segmentation.min_rally_secs = secs;
    }
    if let Some(px) = args.max_jump {
        cfg.classifier.max_jump = px;
    }
    if args.flush_at_end {
        cfg.segmentation.flush_at_end = true;
    }
    if args.max_seconds.is_some() {
        cfg.max_seconds = args.max_seconds;
    }
    if let Some(out) = &args.out {
        cfg.output.dir = out.clone();
    }
    if args.no_export {
        cfg.output.export_clips = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn open_source(args: &Args, cfg: &RallyConfig) -> Result<Box<dyn DetectionSource>> {
    if let Some(path) = &args.detections {
        return Ok(Box::new(ReplaySource::open(path)?));
    }
    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("an input video or --detections is required"))?;
    cfg.detector.check_input(input)?;

    let registry = build_registry(cfg)?;
    let backend = registry.rally_backend()?;
    let file = FileSource::new(FileConfig::new(input))?;
    Ok(Box::new(VideoDetectionSource::open(file, backend)?))
}

fn build_registry(cfg: &RallyConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());

    register_model_backend(&mut registry, cfg)?;

    registry.set_default(&cfg.detector.backend)?;
    log::info!(
        "detector backend: {} (available: {})",
        cfg.detector.backend,
        registry.list().join(", ")
    );
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_model_backend(registry: &mut BackendRegistry, cfg: &RallyConfig) -> Result<()> {
    let Some(model) = &cfg.detector.model_path else {
        return Ok(());
    };
    let backend = rally_splitter::detect::TractBackend::new(model, cfg.detector.inference_size)?
        .with_threshold(cfg.detector.confidence_threshold)
        .with_iou(cfg.detector.nms_iou)
        .with_classes(cfg.detector.class_map());
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_model_backend(_registry: &mut BackendRegistry, cfg: &RallyConfig) -> Result<()> {
    match &cfg.detector.model_path {
        Some(model) if cfg.detector.backend == "tract" => Err(anyhow!(
            "cannot load {}: built without the backend-tract feature",
            model.display()
        )),
        Some(_) => {
            log::warn!("model path ignored: built without the backend-tract feature");
            Ok(())
        }
        None => Ok(()),
    }
}
