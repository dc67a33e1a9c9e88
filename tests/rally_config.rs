use std::sync::Mutex;

use tempfile::NamedTempFile;

use rally_splitter::config::RallyConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RALLY_CONFIG",
        "RALLY_GAP_TOLERANCE_SECS",
        "RALLY_MIN_DURATION_SECS",
        "RALLY_MAX_JUMP",
        "RALLY_OUTPUT_DIR",
        "RALLY_MODEL_PATH",
        "RALLY_CONF_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RallyConfig::load().expect("load config");

    assert_eq!(cfg.classifier.max_object_extent, 65.0);
    assert_eq!(cfg.classifier.foot_zone_ratio, 0.45);
    assert_eq!(cfg.classifier.foot_zone_slack, 40.0);
    assert_eq!(cfg.classifier.max_jump, 300.0);
    assert_eq!(cfg.segmentation.gap_tolerance_secs, 0.6);
    assert_eq!(cfg.segmentation.min_rally_secs, 1.0);
    assert!(!cfg.segmentation.flush_at_end);
    assert_eq!(cfg.detector.backend, "stub");
    assert!(cfg.detector.model_path.is_none());
    assert_eq!(cfg.detector.confidence_threshold, 0.15);
    assert_eq!(cfg.detector.inference_size, 1280);
    assert_eq!(cfg.detector.ball_class_id, 32);
    assert_eq!(cfg.detector.person_class_id, 0);
    assert_eq!(cfg.output.dir.to_str(), Some("rallies"));
    assert!(cfg.output.export_clips);
    assert!(cfg.max_seconds.is_none());
}

#[test]
fn loads_toml_config_from_env_path_with_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("rally.toml");
    std::fs::write(
        &path,
        r#"
max_seconds = 90.0

[classifier]
max_object_extent = 48.0
max_jump = 250.0

[segmentation]
gap_tolerance_secs = 0.8
flush_at_end = true

[detector]
backend = "tract"
model_path = "models/yolo.onnx"
inference_size = 960

[output]
dir = "clips"
export_clips = false
"#,
    )
    .expect("write config");

    std::env::set_var("RALLY_CONFIG", &path);
    std::env::set_var("RALLY_MIN_DURATION_SECS", "2.5");
    std::env::set_var("RALLY_MAX_JUMP", "320");
    std::env::set_var("RALLY_OUTPUT_DIR", "/tmp/rallies-out");

    let cfg = RallyConfig::load().expect("load config");

    assert_eq!(cfg.classifier.max_object_extent, 48.0);
    assert_eq!(cfg.classifier.foot_zone_ratio, 0.45);
    assert_eq!(cfg.classifier.max_jump, 320.0);
    assert_eq!(cfg.segmentation.gap_tolerance_secs, 0.8);
    assert_eq!(cfg.segmentation.min_rally_secs, 2.5);
    assert!(cfg.segmentation.flush_at_end);
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref().and_then(|p| p.to_str()),
        Some("models/yolo.onnx")
    );
    assert_eq!(cfg.detector.inference_size, 960);
    assert_eq!(cfg.output.dir.to_str(), Some("/tmp/rallies-out"));
    assert!(!cfg.output.export_clips);
    assert_eq!(cfg.max_seconds, Some(90.0));

    let opts = cfg.pass_options();
    assert_eq!(opts.segmentation.min_rally_secs, 2.5);
    assert_eq!(opts.max_seconds, Some(90.0));

    clear_env();
}

#[test]
fn loads_json_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(
        &mut file,
        br#"{
            "segmentation": { "gap_tolerance_secs": 0.3, "min_rally_secs": 0.0 },
            "detector": { "ball_class_id": 1, "person_class_id": 2 }
        }"#,
    )
    .expect("write config");
    std::env::set_var("RALLY_CONF_THRESHOLD", "0.4");

    let cfg = RallyConfig::from_path(file.path()).expect("load config");

    assert_eq!(cfg.segmentation.gap_tolerance_secs, 0.3);
    assert_eq!(cfg.segmentation.min_rally_secs, 0.0);
    assert_eq!(cfg.detector.confidence_threshold, 0.4);
    let classes = cfg.detector.class_map();
    assert_eq!(classes.object_class_id, 1);
    assert_eq!(classes.agent_class_id, 2);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[classifier]\nfoot_zone_ratio = 1.5\n")
        .expect("write config");
    assert!(RallyConfig::from_path(file.path()).is_err());

    std::env::set_var("RALLY_GAP_TOLERANCE_SECS", "soon");
    let err = RallyConfig::load().unwrap_err();
    assert!(err.to_string().contains("RALLY_GAP_TOLERANCE_SECS"));

    std::env::set_var("RALLY_GAP_TOLERANCE_SECS", "-1");
    assert!(RallyConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RALLY_CONFIG", "/nonexistent/rally.toml");
    let err = RallyConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}

#[test]
fn model_path_selects_tract_unless_backend_is_named() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RALLY_MODEL_PATH", "models/yolo.onnx");
    let cfg = RallyConfig::load().expect("load config");
    assert_eq!(cfg.detector.backend, "tract");

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[detector]\nmodel_path = \"models/yolo.onnx\"\n")
        .expect("write config");
    std::env::remove_var("RALLY_MODEL_PATH");
    let cfg = RallyConfig::from_path(file.path()).expect("load config");
    assert_eq!(cfg.detector.backend, "tract");

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[detector]\nbackend = \"stub\"\n")
        .expect("write config");
    std::env::set_var("RALLY_MODEL_PATH", "models/yolo.onnx");
    let cfg = RallyConfig::from_path(file.path()).expect("load config");
    assert_eq!(cfg.detector.backend, "stub");

    clear_env();
}

#[test]
fn stub_backend_only_accepts_synthetic_inputs() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RallyConfig::load().expect("load config");
    assert!(cfg.detector.check_input("stub://court").is_ok());
    let err = cfg.detector.check_input("match.mp4").unwrap_err();
    assert!(err.to_string().contains("match.mp4"));
    assert!(err.to_string().contains("RALLY_MODEL_PATH"));

    std::env::set_var("RALLY_MODEL_PATH", "models/yolo.onnx");
    let cfg = RallyConfig::load().expect("load config");
    assert!(cfg.detector.check_input("match.mp4").is_ok());

    clear_env();
}
