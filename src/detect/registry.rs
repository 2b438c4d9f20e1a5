use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::ClassifierBackend;

/// A backend shared between the registry and the detection worker.
pub type SharedBackend = Arc<Mutex<dyn ClassifierBackend>>;

/// Thread-safe registry of classifier backends.
///
/// Backends are wrapped in `Mutex` because `ClassifierBackend::score` takes `&mut self`.
pub struct BackendRegistry {
    backends: BTreeMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: ClassifierBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Result<SharedBackend> {
        self.default_name
            .as_ref()
            .and_then(|name| self.get(name))
            .ok_or_else(|| anyhow!("no classifier backend registered"))
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
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
    use crate::detect::StubBackend;
    use image::RgbImage;

    struct Uniform;

    impl ClassifierBackend for Uniform {
        fn name(&self) -> &'static str {
            "uniform"
        }

        fn score(&mut self, _region: &RgbImage, labels: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0 / labels.len() as f32; labels.len()])
        }
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        assert!(registry.default_backend().is_err());

        registry.register(StubBackend::new());
        registry.register(Uniform);
        assert_eq!(registry.list(), vec!["stub", "uniform"]);

        let default = registry.default_backend().unwrap();
        assert_eq!(default.lock().unwrap().name(), "stub");
    }

    #[test]
    fn set_default_switches_scoring_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        registry.register(Uniform);
        assert!(registry.set_default("tract").is_err());
        registry.set_default("uniform").unwrap();

        let backend = registry.default_backend().unwrap();
        let mut guard = backend.lock().unwrap();
        assert_eq!(guard.name(), "uniform");
        let labels = vec!["a".to_string(), "b".to_string()];
        let scores = guard.score(&RgbImage::new(4, 4), &labels).unwrap();
        assert_eq!(scores, vec![0.5, 0.5]);
    }
}
