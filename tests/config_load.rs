use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use drone_overlay::config::OverlayConfig;
use drone_overlay::{ClampPolicy, Color, DetectionCapability, Frame, Orientation, Origin};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DRONE_OVERLAY_CONFIG",
        "DRONE_OVERLAY_SOURCE",
        "DRONE_OVERLAY_BACKEND",
        "DRONE_OVERLAY_MODEL",
        "DRONE_OVERLAY_LABELS",
        "DRONE_OVERLAY_CONFIDENCE",
        "DRONE_OVERLAY_NMS",
        "DRONE_OVERLAY_CLAMP",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = OverlayConfig::load().expect("load config");
    assert_eq!(cfg.source.path, "stub://camera");
    assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.orientation(), Orientation::Up);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.labels, vec!["drone"]);
    assert_eq!(cfg.detector.nms_threshold, 0.5);
    assert_eq!(cfg.detector.origin, Origin::TopLeft);
    assert_eq!(cfg.overlay.stroke.color, Color::RED);
    assert_eq!(cfg.overlay.stroke.width, 2.0);
    assert_eq!(cfg.overlay.clamp, ClampPolicy::PassThrough);
    assert!(!cfg.overlay.stroke_width_configured);
    assert_eq!(cfg.overlay.still_stroke().width, 12.0);
    assert!(cfg.detector.build_registry().is_ok());
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r##"{
        "source": {
            "path": "/var/lib/drone/samples",
            "width": 1280,
            "height": 720,
            "target_fps": 15,
            "orientation": 6
        },
        "detector": {
            "backend": "stub",
            "labels": ["drone", "bird"],
            "confidence_threshold": 0.4,
            "nms_threshold": 0.45,
            "origin": "bottom_left"
        },
        "overlay": {
            "stroke_color": "#00ff00",
            "stroke_width": 3.5,
            "clamp": "clamp"
        }
    }"##;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("DRONE_OVERLAY_CONFIG", file.path());
    std::env::set_var("DRONE_OVERLAY_SOURCE", "stub://front");
    std::env::set_var("DRONE_OVERLAY_NMS", "0.3");
    std::env::set_var("DRONE_OVERLAY_LABELS", "drone, quadcopter ,");

    let cfg = OverlayConfig::load().expect("load config");

    assert_eq!(cfg.source.path, "stub://front");
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.orientation(), Orientation::Right);
    assert_eq!(cfg.detector.labels, vec!["drone", "quadcopter"]);
    assert_eq!(cfg.detector.confidence_threshold, 0.4);
    assert_eq!(cfg.detector.nms_threshold, 0.3);
    assert_eq!(cfg.detector.origin, Origin::BottomLeft);
    assert_eq!(cfg.overlay.stroke.color, Color::GREEN);
    assert_eq!(cfg.overlay.stroke.width, 3.5);
    assert_eq!(cfg.overlay.clamp, ClampPolicy::Clamp);
    assert_eq!(cfg.file_config().orientation, Orientation::Right);
    assert_eq!(cfg.worker_options().nms_threshold, 0.3);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
[source]
path = "stub://toml"
target_fps = 5

[detector]
nms_threshold = 0.6

[overlay]
stroke_width = 12.0
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = OverlayConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.source.path, "stub://toml");
    assert_eq!(cfg.source.target_fps, 5);
    assert_eq!(cfg.detector.nms_threshold, 0.6);
    assert_eq!(cfg.overlay.stroke.width, 12.0);
}

#[test]
fn configured_stroke_width_applies_to_still_images() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    file.write_all(b"[overlay]\nstroke_width = 3.5\nstroke_color = \"#00ff00\"\n")
        .expect("write config");

    let cfg = OverlayConfig::load_from(Some(file.path())).expect("load config");
    assert!(cfg.overlay.stroke_width_configured);
    let still = cfg.overlay.still_stroke();
    assert_eq!(still.width, 3.5);
    assert_eq!(still.color, Color::GREEN);
}

#[test]
fn bottom_left_origin_flips_backend_boxes() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    file.write_all(b"[detector]\norigin = \"bottom_left\"\n")
        .expect("write config");
    let cfg = OverlayConfig::load_from(Some(file.path())).expect("load config");
    let registry = cfg.detector.build_registry().expect("registry");

    // The stub reports y = 0.3, height = 0.2 for frame 0.
    let frame = Frame::from_rgb(0, 4, 4, Orientation::Up, vec![0; 4 * 4 * 3]).expect("frame");
    let detections = registry
        .detect_with_capability(DetectionCapability::ObjectDetection, &frame, 0.5)
        .expect("detect");
    assert_eq!(detections.len(), 1);
    let bbox = detections[0].bounding_box;
    assert!((bbox.y - 0.5).abs() < 1e-5, "y = {}", bbox.y);
    assert!((bbox.height - 0.2).abs() < 1e-5);

    let top_left = OverlayConfig::load_from(None)
        .expect("defaults")
        .detector
        .build_registry()
        .expect("registry")
        .detect_with_capability(DetectionCapability::ObjectDetection, &frame, 0.5)
        .expect("detect");
    assert!((top_left[0].bounding_box.y - 0.3).abs() < 1e-5);
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cases = [
        r#"{"detector": {"confidence_threshold": 1.5}}"#,
        r#"{"detector": {"backend": "coreml"}}"#,
        r#"{"detector": {"backend": "tract"}}"#,
        r#"{"detector": {"labels": [" "]}}"#,
        r#"{"source": {"orientation": 9}}"#,
        r#"{"source": {"target_fps": 0}}"#,
        r#"{"source": {"width": 70000, "height": 70000}}"#,
        r#"{"overlay": {"stroke_width": 0}}"#,
        r#"{"overlay": {"stroke_color": "red"}}"#,
        r#"{"overlay": {"clamp": "wrap"}}"#,
    ];
    for json in cases {
        let mut file = NamedTempFile::new().expect("temp config");
        file.write_all(json.as_bytes()).expect("write config");
        assert!(
            OverlayConfig::load_from(Some(file.path())).is_err(),
            "accepted {}",
            json
        );
    }

    std::env::set_var("DRONE_OVERLAY_CONFIDENCE", "high");
    assert!(OverlayConfig::load().is_err());
    clear_env();
}
