use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cascade::{AnimalClassSet, AnimalKeywords, CascadeConfig, KeywordMatch};
use crate::detect::{BackendRegistry, Detection, LabelScore, StubClassifier, StubDetector};

#[cfg(feature = "backend-tract")]
use crate::detect::backends::{TractClassifier, TractClassifierConfig, TractDetector, TractDetectorConfig};
#[cfg(feature = "backend-tract")]
use crate::detect::DetectionCapability;

pub const CONFIG_ENV: &str = "ANIMAL_CASCADE_CONFIG";
const BACKEND_ENV: &str = "ANIMAL_CASCADE_BACKEND";
const MIN_BOX_RATIO_ENV: &str = "ANIMAL_CASCADE_MIN_BOX_RATIO";
const DETECTION_THRESHOLD_ENV: &str = "ANIMAL_CASCADE_DETECTION_THRESHOLD";
const CLASSIFIER_THRESHOLD_ENV: &str = "ANIMAL_CASCADE_CLASSIFIER_THRESHOLD";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    backend: Option<String>,
    cascade: Option<CascadeConfigFile>,
    stub: Option<StubConfigFile>,
    #[cfg(feature = "backend-tract")]
    tract: Option<TractSettings>,
}

#[derive(Debug, Deserialize, Default)]
struct CascadeConfigFile {
    min_box_area_ratio: Option<f64>,
    fast_min_confidence: Option<f32>,
    fast_class_ids: Option<Vec<u32>>,
    fast_class_labels: Option<Vec<String>>,
    detection_threshold: Option<f32>,
    precise_keyword_match: Option<KeywordMatch>,
    classifier_threshold: Option<f32>,
    top_k: Option<usize>,
    animal_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct StubConfigFile {
    fast: Option<Vec<Detection>>,
    precise: Option<Vec<Detection>>,
    classifier: Option<Vec<LabelScore>>,
}

/// Which family of providers backs the cascade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Canned outputs from the config file.
    #[default]
    Stub,
    /// ONNX models run with tract (`backend-tract` feature).
    Tract,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "tract" => Ok(Self::Tract),
            other => Err(anyhow!("unknown backend '{}' (expected stub or tract)", other)),
        }
    }
}

/// Canned provider outputs for the stub backend.
#[derive(Debug, Clone, Default)]
pub struct StubSettings {
    pub fast: Vec<Detection>,
    pub precise: Vec<Detection>,
    pub classifier: Vec<LabelScore>,
}

#[cfg(feature = "backend-tract")]
#[derive(Debug, Clone, Deserialize)]
pub struct TractSettings {
    pub fast: TractDetectorConfig,
    pub precise: TractDetectorConfig,
    pub classifier: TractClassifierConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub cascade: CascadeConfig,
    pub stub: StubSettings,
    #[cfg(feature = "backend-tract")]
    pub tract: Option<TractSettings>,
    /// Stub chosen only because nothing else was configured: no config file
    /// and no backend named in the environment or via `set_backend`.
    implicit_stub: bool,
}

impl AppConfig {
    /// Load from `path`, or from `ANIMAL_CASCADE_CONFIG` when no path is given,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let loaded_file = file_cfg.is_some();
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.implicit_stub = !loaded_file;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Select the provider family explicitly, e.g. from a command-line flag.
    pub fn set_backend(&mut self, backend: BackendKind) {
        self.backend = backend;
        self.implicit_stub = false;
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let backend = match file.backend.as_deref() {
            Some(name) => name.parse()?,
            None => BackendKind::default(),
        };

        let defaults = CascadeConfig::default();
        let c = file.cascade.unwrap_or_default();
        let fast_classes = match (c.fast_class_ids, c.fast_class_labels) {
            (None, None) => defaults.fast_classes,
            (ids, labels) => {
                AnimalClassSet::new(ids.unwrap_or_default(), labels.unwrap_or_default())
            }
        };
        let cascade = CascadeConfig {
            min_box_area_ratio: c.min_box_area_ratio.unwrap_or(defaults.min_box_area_ratio),
            fast_min_confidence: c.fast_min_confidence.unwrap_or(defaults.fast_min_confidence),
            fast_classes,
            detection_threshold: c.detection_threshold.unwrap_or(defaults.detection_threshold),
            precise_keyword_match: c
                .precise_keyword_match
                .unwrap_or(defaults.precise_keyword_match),
            classifier_threshold: c
                .classifier_threshold
                .unwrap_or(defaults.classifier_threshold),
            top_k: c.top_k.unwrap_or(defaults.top_k),
            keywords: c
                .animal_keywords
                .map(AnimalKeywords::new)
                .unwrap_or(defaults.keywords),
        };

        let stub = file.stub.unwrap_or_default();
        Ok(Self {
            backend,
            cascade,
            stub: StubSettings {
                fast: stub.fast.unwrap_or_default(),
                precise: stub.precise.unwrap_or_default(),
                classifier: stub.classifier.unwrap_or_default(),
            },
            #[cfg(feature = "backend-tract")]
            tract: file.tract,
            implicit_stub: false,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var(BACKEND_ENV) {
            if !backend.trim().is_empty() {
                self.set_backend(backend.parse()?);
            }
        }
        if let Some(ratio) = env_number::<f64>(MIN_BOX_RATIO_ENV)? {
            self.cascade.min_box_area_ratio = ratio;
        }
        if let Some(threshold) = env_number::<f32>(DETECTION_THRESHOLD_ENV)? {
            self.cascade.detection_threshold = threshold;
        }
        if let Some(threshold) = env_number::<f32>(CLASSIFIER_THRESHOLD_ENV)? {
            self.cascade.classifier_threshold = threshold;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let c = &self.cascade;
        check_unit_range("min_box_area_ratio", c.min_box_area_ratio)?;
        check_unit_range("fast_min_confidence", c.fast_min_confidence as f64)?;
        check_unit_range("detection_threshold", c.detection_threshold as f64)?;
        check_unit_range("classifier_threshold", c.classifier_threshold as f64)?;
        if c.top_k == 0 {
            return Err(anyhow!("top_k must be greater than zero"));
        }
        if c.keywords.is_empty() {
            return Err(anyhow!("animal_keywords must not be empty"));
        }
        if c.fast_classes.is_empty() {
            return Err(anyhow!("fast detector animal class set must not be empty"));
        }
        Ok(())
    }

    /// Register the providers selected by `backend`.
    pub fn build_registry(&self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        match self.backend {
            BackendKind::Stub if self.implicit_stub => {
                return Err(anyhow!(
                    "no config file or backend given; the stub backend runs no models \
                     (pass --config, or select a backend with --backend or {})",
                    BACKEND_ENV
                ));
            }
            BackendKind::Stub => {
                if self.stub.fast.is_empty()
                    && self.stub.precise.is_empty()
                    && self.stub.classifier.is_empty()
                {
                    log::warn!("stub backend has no canned outputs; every image will be reported as no animal");
                }
                registry.register_detector(StubDetector::fast(self.stub.fast.clone()));
                registry.register_detector(StubDetector::precise(self.stub.precise.clone()));
                registry.register_classifier(StubClassifier::new(self.stub.classifier.clone()));
            }
            BackendKind::Tract => {
                #[cfg(feature = "backend-tract")]
                {
                    let tract = self
                        .tract
                        .as_ref()
                        .ok_or_else(|| anyhow!("tract backend selected but no [tract] section configured"))?;
                    registry.register_detector(TractDetector::new(
                        DetectionCapability::FastDetection,
                        tract.fast.clone(),
                    )?);
                    registry.register_detector(TractDetector::new(
                        DetectionCapability::PreciseDetection,
                        tract.precise.clone(),
                    )?);
                    registry.register_classifier(TractClassifier::new(tract.classifier.clone())?);
                }
                #[cfg(not(feature = "backend-tract"))]
                {
                    return Err(anyhow!(
                        "tract backend requires the backend-tract feature"
                    ));
                }
            }
        }
        Ok(registry)
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", key)),
        _ => Ok(None),
    }
}

fn check_unit_range(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}
