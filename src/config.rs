use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::load_catalog;
use crate::detect::{BackendRegistry, StubBackend};
use crate::misplacement::MatchRules;
use crate::nms::DEFAULT_IOU_THRESHOLD;
use crate::pipeline::{PipelineSettings, DEFAULT_MIN_CONTRAST};
use crate::proposer::{ProposalMode, SlidingWindow};
use crate::scoring::{Thresholds, DEFAULT_PRESENT_THRESHOLD, DEFAULT_UNCERTAIN_THRESHOLD};
use crate::templates::{ItemTemplates, LabelTemplate};

const DEFAULT_SOURCE_URI: &str = "stub://tool_board";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_CATALOG_PATH: &str = "instances_default.json";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_LOGIT_SCALE: f32 = 100.0;
const DEFAULT_INTERVAL_MS: u64 = 2000;
const DEFAULT_WINDOW: u32 = 100;
const DEFAULT_STRIDE: u32 = 50;
const DEFAULT_SCALE: f64 = 0.5;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    catalog: Option<CatalogConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    detection: Option<DetectionConfigFile>,
    report: Option<ReportConfigFile>,
    templates: Option<BTreeMap<String, LabelTemplate>>,
    synonyms: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CatalogConfigFile {
    path: Option<PathBuf>,
    mode: Option<ProposalKind>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    embeddings_path: Option<PathBuf>,
    input_size: Option<u32>,
    logit_scale: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    interval_ms: Option<u64>,
    present_threshold: Option<f32>,
    uncertain_threshold: Option<f32>,
    min_contrast: Option<f32>,
    iou_threshold: Option<f32>,
    window: Option<u32>,
    stride: Option<u32>,
    scale: Option<f64>,
    identify: Option<bool>,
    resolve_misplacement: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    dir: Option<PathBuf>,
    overlays: Option<bool>,
}

/// How regions are proposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    #[default]
    Catalog,
    SlidingWindow,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceSettings,
    pub catalog: CatalogSettings,
    pub classifier: ClassifierSettings,
    pub detection: DetectionSettings,
    pub report: ReportSettings,
    pub templates: ItemTemplates,
    pub rules: MatchRules,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub uri: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub path: PathBuf,
    pub mode: ProposalKind,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub embeddings_path: Option<PathBuf>,
    pub input_size: u32,
    pub logit_scale: f32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub interval: Duration,
    pub present_threshold: f32,
    pub uncertain_threshold: f32,
    pub min_contrast: f32,
    pub iou_threshold: f32,
    pub window: u32,
    pub stride: u32,
    pub scale: f64,
    pub identify: bool,
    pub resolve_misplacement: bool,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Reports are written only when set.
    pub dir: Option<PathBuf>,
    pub overlays: bool,
}

impl MonitorConfig {
    /// Load from `TOOLBOARD_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("TOOLBOARD_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => MonitorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let catalog = file.catalog.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let report = file.report.unwrap_or_default();

        let mut templates = ItemTemplates::default();
        for (class, template) in file.templates.unwrap_or_default() {
            templates.insert(class, template);
        }
        let mut rules = MatchRules::default();
        for (class, synonyms) in file.synonyms.unwrap_or_default() {
            rules.insert(class, synonyms);
        }

        Self {
            source: SourceSettings {
                uri: source
                    .uri
                    .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
                fps: source.fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            catalog: CatalogSettings {
                path: catalog
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
                mode: catalog.mode.unwrap_or_default(),
            },
            classifier: ClassifierSettings {
                backend: classifier
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: classifier.model_path,
                embeddings_path: classifier.embeddings_path,
                input_size: classifier.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                logit_scale: classifier.logit_scale.unwrap_or(DEFAULT_LOGIT_SCALE),
            },
            detection: DetectionSettings {
                interval: Duration::from_millis(
                    detection.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS),
                ),
                present_threshold: detection
                    .present_threshold
                    .unwrap_or(DEFAULT_PRESENT_THRESHOLD),
                uncertain_threshold: detection
                    .uncertain_threshold
                    .unwrap_or(DEFAULT_UNCERTAIN_THRESHOLD),
                min_contrast: detection.min_contrast.unwrap_or(DEFAULT_MIN_CONTRAST),
                iou_threshold: detection.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
                window: detection.window.unwrap_or(DEFAULT_WINDOW),
                stride: detection.stride.unwrap_or(DEFAULT_STRIDE),
                scale: detection.scale.unwrap_or(DEFAULT_SCALE),
                identify: detection.identify.unwrap_or(true),
                resolve_misplacement: detection.resolve_misplacement.unwrap_or(true),
            },
            report: ReportSettings {
                dir: report.dir,
                overlays: report.overlays.unwrap_or(false),
            },
            templates,
            rules,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("TOOLBOARD_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(path) = std::env::var("TOOLBOARD_CATALOG") {
            if !path.trim().is_empty() {
                self.catalog.path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("TOOLBOARD_BACKEND") {
            if !backend.trim().is_empty() {
                self.classifier.backend = backend.trim().to_string();
            }
        }
        if let Ok(interval) = std::env::var("TOOLBOARD_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("TOOLBOARD_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.detection.interval = Duration::from_millis(millis);
        }
        if let Ok(dir) = std::env::var("TOOLBOARD_REPORT_DIR") {
            if !dir.trim().is_empty() {
                self.report.dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.thresholds()?;
        self.sliding_window()?;
        if self.source.fps == 0 {
            return Err(anyhow!("source fps must be at least 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.detection.interval.is_zero() {
            return Err(anyhow!("detection interval must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(anyhow!(
                "iou_threshold must be within [0, 1], got {}",
                self.detection.iou_threshold
            ));
        }
        if !self.detection.min_contrast.is_finite() {
            return Err(anyhow!("min_contrast must be finite"));
        }
        if self.classifier.input_size == 0 {
            return Err(anyhow!("classifier input_size must be greater than zero"));
        }
        if self.classifier.backend.is_empty() {
            return Err(anyhow!("classifier backend must not be empty"));
        }
        for class in self.templates.classes() {
            let template = self.templates.template_for(class);
            if template.positive.is_empty() || template.negative.is_empty() {
                return Err(anyhow!(
                    "template for {} needs positive and negative labels",
                    class
                ));
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Ok(Thresholds::new(
            self.detection.present_threshold,
            self.detection.uncertain_threshold,
        )?)
    }

    pub fn sliding_window(&self) -> Result<SlidingWindow> {
        Ok(SlidingWindow::new(
            self.detection.window,
            self.detection.stride,
            self.detection.scale,
        )?)
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            thresholds: self.thresholds()?,
            iou_threshold: self.detection.iou_threshold,
            min_contrast: self.detection.min_contrast,
            identify: self.detection.identify,
            resolve_misplacement: self.detection.resolve_misplacement,
        })
    }

    /// Proposal mode; catalog mode loads the catalog file.
    pub fn proposal_mode(&self) -> Result<ProposalMode> {
        match self.catalog.mode {
            ProposalKind::Catalog => {
                let catalog = load_catalog(&self.catalog.path)?;
                Ok(ProposalMode::Catalog(Arc::new(catalog)))
            }
            ProposalKind::SlidingWindow => Ok(ProposalMode::SlidingWindow(self.sliding_window()?)),
        }
    }

    /// Registry with every available backend; the configured one is default.
    pub fn backend_registry(&self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());

        #[cfg(feature = "backend-tract")]
        {
            if let (Some(model), Some(embeddings)) = (
                self.classifier.model_path.as_ref(),
                self.classifier.embeddings_path.as_ref(),
            ) {
                let backend = crate::detect::TractBackend::new(
                    model,
                    embeddings,
                    self.classifier.input_size,
                )?
                .with_logit_scale(self.classifier.logit_scale);
                registry.register(backend);
            }
        }

        registry.set_default(&self.classifier.backend)?;
        Ok(registry)
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
