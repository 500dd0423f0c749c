use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::{extract_detections, non_max_suppression, DetectionResult};
use crate::frame::Frame;

use super::backend::{DetectionCapability, DetectorBackend};

/// Thread-safe registry of detector backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Prefers the default backend when it supports the capability.
    pub fn backend_for_capability(
        &self,
        capability: DetectionCapability,
    ) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        if let Some(default_backend) = self.default_backend() {
            let supports = {
                let guard = default_backend
                    .lock()
                    .map_err(|_| anyhow!("default backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(default_backend);
            }
        }

        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }

    /// Warm up every registered backend.
    pub fn warm_up_all(&self) -> Result<()> {
        for backend in self.backends.values() {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend lock poisoned"))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Run detection with a capable backend, then extract typed results and
    /// suppress overlapping boxes.
    pub fn detect_with_capability(
        &self,
        capability: DetectionCapability,
        frame: &Frame,
        nms_threshold: f32,
    ) -> Result<Vec<DetectionResult>> {
        let backend = self.backend_for_capability(capability)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        let observations = guard.detect(frame)?;
        let detections = extract_detections(&observations, guard.origin())?;
        Ok(non_max_suppression(detections, nms_threshold))
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
    use crate::detect::backends::StubBackend;
    use crate::detect::result::Observation;
    use crate::frame::Orientation;
    use crate::geometry::{NormalizedRect, Origin};

    struct ClassifierOnly;

    impl DetectorBackend for ClassifierOnly {
        fn name(&self) -> &'static str {
            "classifier"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            matches!(capability, DetectionCapability::Classification)
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Observation>> {
            Ok(vec![])
        }
    }

    struct FlippedBackend;

    impl DetectorBackend for FlippedBackend {
        fn name(&self) -> &'static str {
            "flipped"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            matches!(capability, DetectionCapability::ObjectDetection)
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Observation>> {
            Ok(vec![
                Observation::object("drone", 0.9, NormalizedRect::new(0.1, 0.0, 0.2, 0.2)),
                Observation::object("drone", 0.6, NormalizedRect::new(0.1, 0.01, 0.2, 0.2)),
            ])
        }

        fn origin(&self) -> Origin {
            Origin::BottomLeft
        }
    }

    fn frame() -> Frame {
        Frame::from_rgb(0, 2, 2, Orientation::Up, vec![0u8; 12]).unwrap()
    }

    #[test]
    fn falls_back_to_capable_backend() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(ClassifierOnly);
        registry.register(StubBackend::new());
        assert_eq!(registry.list(), vec!["classifier", "stub"]);

        let backend = registry.backend_for_capability(DetectionCapability::ObjectDetection)?;
        let name = backend.lock().map_err(|_| anyhow!("poisoned"))?.name();
        assert_eq!(name, "stub");
        Ok(())
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::new();
        assert!(registry.set_default("stub").is_err());
        registry.register(StubBackend::new());
        assert!(registry.set_default("stub").is_ok());
        assert!(registry.default_backend().is_some());
    }

    #[test]
    fn missing_capability_is_an_error() {
        let mut registry = BackendRegistry::new();
        registry.register(ClassifierOnly);
        assert!(registry
            .detect_with_capability(DetectionCapability::ObjectDetection, &frame(), 0.5)
            .is_err());
    }

    #[test]
    fn detect_extracts_and_suppresses() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(FlippedBackend);
        registry.warm_up_all()?;
        let dets =
            registry.detect_with_capability(DetectionCapability::ObjectDetection, &frame(), 0.5)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.9);
        assert!((dets[0].bounding_box.y - 0.8).abs() < 1e-6);
        Ok(())
    }
}
