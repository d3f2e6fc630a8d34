use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::{ClassifierBackend, DetectionCapability, DetectorBackend};
use crate::cascade::{AnimalCascade, CascadeConfig};

/// Registry of capability providers, keyed by backend name.
///
/// Providers are shared read-only services, so they are held behind `Arc`
/// and handed to the cascade without locking.
pub struct BackendRegistry {
    detectors: BTreeMap<String, Arc<dyn DetectorBackend>>,
    classifiers: BTreeMap<String, Arc<dyn ClassifierBackend>>,
    default_detector: Option<String>,
    default_classifier: Option<String>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("detectors", &self.detectors.keys().collect::<Vec<_>>())
            .field("classifiers", &self.classifiers.keys().collect::<Vec<_>>())
            .field("default_detector", &self.default_detector)
            .field("default_classifier", &self.default_classifier)
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            detectors: BTreeMap::new(),
            classifiers: BTreeMap::new(),
            default_detector: None,
            default_classifier: None,
        }
    }

    /// Register a detector. The first registered detector becomes the default.
    pub fn register_detector<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_detector.is_none() {
            self.default_detector = Some(name.clone());
        }
        self.detectors.insert(name, Arc::new(backend));
    }

    /// Register a classifier. The first registered classifier becomes the default.
    pub fn register_classifier<B: ClassifierBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_classifier.is_none() {
            self.default_classifier = Some(name.clone());
        }
        self.classifiers.insert(name, Arc::new(backend));
    }

    /// Set default detector by name.
    pub fn set_default_detector(&mut self, name: &str) -> Result<()> {
        if !self.detectors.contains_key(name) {
            return Err(anyhow!("detector backend '{}' not registered", name));
        }
        self.default_detector = Some(name.to_string());
        Ok(())
    }

    pub fn detector(&self, name: &str) -> Option<Arc<dyn DetectorBackend>> {
        self.detectors.get(name).cloned()
    }

    /// List registered backend names, detectors first.
    pub fn list(&self) -> Vec<String> {
        self.detectors
            .keys()
            .chain(self.classifiers.keys())
            .cloned()
            .collect()
    }

    /// Select a detector that supports the requested capability.
    ///
    /// Prefers the default detector when it supports the capability, then the
    /// first supporting detector in name order.
    pub fn detector_for(&self, capability: DetectionCapability) -> Result<Arc<dyn DetectorBackend>> {
        if let Some(default) = self
            .default_detector
            .as_deref()
            .and_then(|name| self.detector(name))
        {
            if default.supports(capability) {
                return Ok(default);
            }
        }

        self.detectors
            .values()
            .find(|backend| backend.supports(capability))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "no registered backend supports capability {:?}",
                    capability
                )
            })
    }

    pub fn classifier(&self) -> Result<Arc<dyn ClassifierBackend>> {
        self.default_classifier
            .as_deref()
            .and_then(|name| self.classifiers.get(name).cloned())
            .ok_or_else(|| {
                anyhow!(
                    "no registered backend supports capability {:?}",
                    DetectionCapability::Classification
                )
            })
    }

    /// Assemble the standard cascade from registered providers.
    pub fn build_cascade(&self, config: &CascadeConfig) -> Result<AnimalCascade> {
        let fast = self.detector_for(DetectionCapability::FastDetection)?;
        let precise = self.detector_for(DetectionCapability::PreciseDetection)?;
        let classifier = self.classifier()?;
        log::debug!(
            "cascade backends: fast={} precise={} classifier={}",
            fast.name(),
            precise.name(),
            classifier.name()
        );
        Ok(AnimalCascade::new(fast, precise, classifier, config))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{StubClassifier, StubDetector};

    #[test]
    fn selects_backend_per_capability() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register_detector(StubDetector::precise(vec![]));
        registry.register_detector(StubDetector::fast(vec![]));

        // default is stub-precise, which cannot serve fast detection
        let fast = registry.detector_for(DetectionCapability::FastDetection)?;
        assert_eq!(fast.name(), "stub-fast");
        let precise = registry.detector_for(DetectionCapability::PreciseDetection)?;
        assert_eq!(precise.name(), "stub-precise");
        Ok(())
    }

    #[test]
    fn missing_capability_is_an_error() {
        let mut registry = BackendRegistry::new();
        registry.register_detector(StubDetector::fast(vec![]));
        assert!(registry
            .detector_for(DetectionCapability::PreciseDetection)
            .is_err());
        assert!(registry.classifier().is_err());
        assert!(registry.build_cascade(&CascadeConfig::default()).is_err());
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::new();
        assert!(registry.set_default_detector("nope").is_err());
        registry.register_detector(StubDetector::fast(vec![]).with_name("alt"));
        registry.register_detector(StubDetector::fast(vec![]));
        registry.set_default_detector("stub-fast").unwrap();
        let fast = registry
            .detector_for(DetectionCapability::FastDetection)
            .unwrap();
        assert_eq!(fast.name(), "stub-fast");
    }

    #[test]
    fn builds_full_cascade() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register_detector(StubDetector::fast(vec![]));
        registry.register_detector(StubDetector::precise(vec![]));
        registry.register_classifier(StubClassifier::new(vec![]));
        assert_eq!(
            registry.list(),
            vec!["stub-fast", "stub-precise", "stub-classifier"]
        );
        let cascade = registry.build_cascade(&CascadeConfig::default())?;
        assert_eq!(cascade.methods().len(), 3);
        Ok(())
    }
}
