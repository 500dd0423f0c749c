use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{BackendRegistry, StubBackend};
use crate::frame::Orientation;
use crate::geometry::{ClampPolicy, Origin};
use crate::ingest::file::MAX_SYNTHETIC_DIMENSION;
use crate::ingest::FileConfig;
use crate::overlay::{Color, StrokeStyle};
use crate::pipeline::WorkerOptions;

const DEFAULT_SOURCE_PATH: &str = "stub://camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_LABEL: &str = "drone";
const DEFAULT_INPUT_SIZE: u32 = 416;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.5;
const DEFAULT_STROKE_COLOR: &str = "#ff0000ff";
const DEFAULT_STROKE_WIDTH: f32 = 2.0;

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayStyleFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    orientation: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels: Option<Vec<String>>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    origin: Option<Origin>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayStyleFile {
    stroke_color: Option<String>,
    stroke_width: Option<f32>,
    clamp: Option<ClampPolicy>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Raw EXIF tag; validated into `Orientation` by `validate`.
    pub orientation: u8,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels: Vec<String>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub stroke: StrokeStyle,
    /// True when `stroke_width` was set in the config file.
    pub stroke_width_configured: bool,
    pub clamp: ClampPolicy,
}

impl OverlaySettings {
    /// Style for still images: the configured color, and the configured width
    /// if one was given, otherwise the still-image preset width.
    pub fn still_stroke(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.stroke.color,
            width: if self.stroke_width_configured {
                self.stroke.width
            } else {
                StrokeStyle::still().width
            },
        }
    }
}

impl OverlayConfig {
    /// Load from `DRONE_OVERLAY_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DRONE_OVERLAY_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => OverlayConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();

        let stroke_color = Color::parse_hex(
            overlay
                .stroke_color
                .as_deref()
                .unwrap_or(DEFAULT_STROKE_COLOR),
        )?;

        Ok(Self {
            source: SourceSettings {
                path: source
                    .path
                    .unwrap_or_else(|| DEFAULT_SOURCE_PATH.to_string()),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                orientation: source.orientation.unwrap_or(1),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector.model_path,
                labels: detector
                    .labels
                    .unwrap_or_else(|| vec![DEFAULT_LABEL.to_string()]),
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
                origin: detector.origin.unwrap_or_default(),
            },
            overlay: OverlaySettings {
                stroke: StrokeStyle {
                    color: stroke_color,
                    width: overlay.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH),
                },
                stroke_width_configured: overlay.stroke_width.is_some(),
                clamp: overlay.clamp.unwrap_or_default(),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DRONE_OVERLAY_SOURCE") {
            if !path.trim().is_empty() {
                self.source.path = path;
            }
        }
        if let Ok(backend) = std::env::var("DRONE_OVERLAY_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(model) = std::env::var("DRONE_OVERLAY_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(labels) = std::env::var("DRONE_OVERLAY_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.detector.labels = parsed;
            }
        }
        if let Ok(value) = std::env::var("DRONE_OVERLAY_CONFIDENCE") {
            self.detector.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DRONE_OVERLAY_CONFIDENCE must be a number"))?;
        }
        if let Ok(value) = std::env::var("DRONE_OVERLAY_NMS") {
            self.detector.nms_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DRONE_OVERLAY_NMS must be a number"))?;
        }
        if let Ok(value) = std::env::var("DRONE_OVERLAY_CLAMP") {
            self.overlay.clamp = ClampPolicy::parse(&value)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.width > MAX_SYNTHETIC_DIMENSION || self.source.height > MAX_SYNTHETIC_DIMENSION
        {
            return Err(anyhow!(
                "source width and height must be at most {}",
                MAX_SYNTHETIC_DIMENSION
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        Orientation::from_exif(self.source.orientation)?;
        check_unit("confidence_threshold", self.detector.confidence_threshold)?;
        check_unit("nms_threshold", self.detector.nms_threshold)?;
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        self.detector.labels.retain(|label| !label.trim().is_empty());
        if self.detector.labels.is_empty() {
            return Err(anyhow!("detector labels must not be empty"));
        }
        match self.detector.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.detector.model_path.is_none() {
                    return Err(anyhow!("tract backend requires detector.model_path"));
                }
            }
            other => return Err(anyhow!("unknown detector backend '{}'", other)),
        }
        let stroke = self.overlay.stroke.width;
        if !stroke.is_finite() || stroke <= 0.0 {
            return Err(anyhow!("overlay stroke_width must be greater than zero"));
        }
        Ok(())
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_exif(self.source.orientation).unwrap_or_default()
    }

    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            path: self.source.path.clone(),
            width: self.source.width,
            height: self.source.height,
            orientation: self.orientation(),
        }
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            nms_threshold: self.detector.nms_threshold,
            ..WorkerOptions::default()
        }
    }
}

impl DetectorSettings {
    /// Build a registry holding the configured backend.
    pub fn build_registry(&self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        match self.backend.as_str() {
            "stub" => registry.register(StubBackend::new().with_origin(self.origin)),
            "tract" => self.register_tract(&mut registry)?,
            other => return Err(anyhow!("unknown detector backend '{}'", other)),
        }
        Ok(registry)
    }

    #[cfg(feature = "backend-tract")]
    fn register_tract(&self, registry: &mut BackendRegistry) -> Result<()> {
        let model_path = self
            .model_path
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
        let backend =
            crate::detect::TractBackend::new(model_path, self.input_size, self.labels.clone())?
                .with_threshold(self.confidence_threshold)
                .with_origin(self.origin);
        registry.register(backend);
        Ok(())
    }

    #[cfg(not(feature = "backend-tract"))]
    fn register_tract(&self, _registry: &mut BackendRegistry) -> Result<()> {
        Err(anyhow!("tract backend requires the backend-tract feature"))
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
