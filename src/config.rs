use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::ClassifierConfig;
use crate::detect::ClassMap;
use crate::pipeline::PassOptions;
use crate::segment::SegmentationConfig;

const STUB_BACKEND: &str = "stub";
const MODEL_BACKEND: &str = "tract";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;
const DEFAULT_INFERENCE_SIZE: u32 = 1280;
const DEFAULT_NMS_IOU: f32 = 0.7;
const DEFAULT_BALL_CLASS_ID: u32 = 32;
const DEFAULT_PERSON_CLASS_ID: u32 = 0;
const DEFAULT_OUTPUT_DIR: &str = "rallies";

#[derive(Debug, Deserialize, Default)]
struct RallyConfigFile {
    max_seconds: Option<f64>,
    classifier: Option<ClassifierConfigFile>,
    segmentation: Option<SegmentationConfigFile>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    max_object_extent: Option<f32>,
    foot_zone_ratio: Option<f32>,
    foot_zone_slack: Option<f32>,
    max_jump: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SegmentationConfigFile {
    gap_tolerance_secs: Option<f64>,
    min_rally_secs: Option<f64>,
    flush_at_end: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    inference_size: Option<u32>,
    nms_iou: Option<f32>,
    ball_class_id: Option<u32>,
    person_class_id: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    export_clips: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RallyConfig {
    pub classifier: ClassifierConfig,
    pub segmentation: SegmentationConfig,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
    /// Only process this many seconds of footage.
    pub max_seconds: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Backend name. Defaults to `tract` when a model path is configured and
    /// to `stub` otherwise.
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub inference_size: u32,
    pub nms_iou: f32,
    pub ball_class_id: u32,
    pub person_class_id: u32,
}

impl DetectorSettings {
    pub fn class_map(&self) -> ClassMap {
        ClassMap {
            object_class_id: self.ball_class_id,
            agent_class_id: self.person_class_id,
        }
    }

    /// Refuse to scan real footage with the stub backend, which never
    /// detects anything and would report an empty match.
    pub fn check_input(&self, input: &str) -> Result<()> {
        if self.backend == STUB_BACKEND && !input.starts_with("stub://") {
            return Err(anyhow!(
                "no detector for {}: the stub backend only serves stub:// inputs; \
                 set detector.model_path (or RALLY_MODEL_PATH) or choose another backend",
                input
            ));
        }
        Ok(())
    }
}

fn default_backend(model_path: Option<&Path>) -> String {
    match model_path {
        Some(_) => MODEL_BACKEND.to_string(),
        None => STUB_BACKEND.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub export_clips: bool,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self::resolve(RallyConfigFile::default())
    }
}

impl RallyConfig {
    /// Load from the file named by `RALLY_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RALLY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::finish(file_cfg.unwrap_or_default())
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::finish(read_config_file(path.as_ref())?)
    }

    fn finish(file: RallyConfigFile) -> Result<Self> {
        let backend_set = file
            .detector
            .as_ref()
            .is_some_and(|d| d.backend.is_some());
        let mut cfg = Self::resolve(file);
        cfg.apply_env()?;
        if !backend_set {
            cfg.detector.backend = default_backend(cfg.detector.model_path.as_deref());
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve(file: RallyConfigFile) -> Self {
        let classifier_defaults = ClassifierConfig::default();
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = ClassifierConfig {
            max_object_extent: classifier_file
                .max_object_extent
                .unwrap_or(classifier_defaults.max_object_extent),
            foot_zone_ratio: classifier_file
                .foot_zone_ratio
                .unwrap_or(classifier_defaults.foot_zone_ratio),
            foot_zone_slack: classifier_file
                .foot_zone_slack
                .unwrap_or(classifier_defaults.foot_zone_slack),
            max_jump: classifier_file
                .max_jump
                .unwrap_or(classifier_defaults.max_jump),
        };

        let segmentation_defaults = SegmentationConfig::default();
        let segmentation_file = file.segmentation.unwrap_or_default();
        let segmentation = SegmentationConfig {
            gap_tolerance_secs: segmentation_file
                .gap_tolerance_secs
                .unwrap_or(segmentation_defaults.gap_tolerance_secs),
            min_rally_secs: segmentation_file
                .min_rally_secs
                .unwrap_or(segmentation_defaults.min_rally_secs),
            flush_at_end: segmentation_file
                .flush_at_end
                .unwrap_or(segmentation_defaults.flush_at_end),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| default_backend(detector_file.model_path.as_deref())),
            model_path: detector_file.model_path,
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            inference_size: detector_file
                .inference_size
                .unwrap_or(DEFAULT_INFERENCE_SIZE),
            nms_iou: detector_file.nms_iou.unwrap_or(DEFAULT_NMS_IOU),
            ball_class_id: detector_file
                .ball_class_id
                .unwrap_or(DEFAULT_BALL_CLASS_ID),
            person_class_id: detector_file
                .person_class_id
                .unwrap_or(DEFAULT_PERSON_CLASS_ID),
        };

        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            dir: output_file
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            export_clips: output_file.export_clips.unwrap_or(true),
        };

        Self {
            classifier,
            segmentation,
            detector,
            output,
            max_seconds: file.max_seconds,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(secs) = env_number::<f64>("RALLY_GAP_TOLERANCE_SECS")? {
            self.segmentation.gap_tolerance_secs = secs;
        }
        if let Some(secs) = env_number::<f64>("RALLY_MIN_DURATION_SECS")? {
            self.segmentation.min_rally_secs = secs;
        }
        if let Some(px) = env_number::<f32>("RALLY_MAX_JUMP")? {
            self.classifier.max_jump = px;
        }
        if let Some(threshold) = env_number::<f32>("RALLY_CONF_THRESHOLD")? {
            self.detector.confidence_threshold = threshold;
        }
        if let Ok(dir) = std::env::var("RALLY_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("RALLY_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    /// Reject values the classifier or segmenter cannot work with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(c.max_object_extent.is_finite() && c.max_object_extent > 0.0) {
            return Err(anyhow!("classifier.max_object_extent must be positive"));
        }
        if !(0.0..=1.0).contains(&c.foot_zone_ratio) {
            return Err(anyhow!("classifier.foot_zone_ratio must be within [0, 1]"));
        }
        if !(c.foot_zone_slack.is_finite() && c.foot_zone_slack >= 0.0) {
            return Err(anyhow!("classifier.foot_zone_slack must not be negative"));
        }
        if !(c.max_jump.is_finite() && c.max_jump > 0.0) {
            return Err(anyhow!("classifier.max_jump must be positive"));
        }

        let s = &self.segmentation;
        if !(s.gap_tolerance_secs.is_finite() && s.gap_tolerance_secs >= 0.0) {
            return Err(anyhow!("segmentation.gap_tolerance_secs must not be negative"));
        }
        if !(s.min_rally_secs.is_finite() && s.min_rally_secs >= 0.0) {
            return Err(anyhow!("segmentation.min_rally_secs must not be negative"));
        }

        let d = &self.detector;
        if d.backend.trim().is_empty() {
            return Err(anyhow!("detector.backend must not be empty"));
        }
        if !(0.0..=1.0).contains(&d.confidence_threshold) {
            return Err(anyhow!("detector.confidence_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&d.nms_iou) {
            return Err(anyhow!("detector.nms_iou must be within [0, 1]"));
        }
        if d.inference_size == 0 || d.inference_size % 32 != 0 {
            return Err(anyhow!(
                "detector.inference_size must be a positive multiple of 32"
            ));
        }
        if d.ball_class_id == d.person_class_id {
            return Err(anyhow!(
                "detector.ball_class_id and detector.person_class_id must differ"
            ));
        }

        if let Some(secs) = self.max_seconds {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(anyhow!("max_seconds must be positive"));
            }
        }
        Ok(())
    }

    /// Thresholds for a detection pass.
    pub fn pass_options(&self) -> PassOptions {
        PassOptions {
            classifier: self.classifier,
            segmentation: self.segmentation,
            max_seconds: self.max_seconds,
        }
    }
}

fn read_config_file(path: &Path) -> Result<RallyConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", name)),
        _ => Ok(None),
    }
}
