use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::DetectionResult;

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
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
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
            let backend = &self.backends[&name];
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(backend.clone());
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }

    /// Backend handle for rally tracking: must report both objects and agents.
    pub fn rally_backend(&self) -> Result<SharedBackend> {
        let backend = self.backend_for_capability(DetectionCapability::ObjectDetection)?;
        let supports_agents = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?
            .supports(DetectionCapability::AgentDetection);
        if !supports_agents {
            log::warn!("selected backend does not report agents; shoe filter disabled");
        }
        Ok(SharedBackend(backend))
    }

    /// Run detection using a backend that supports the requested capability.
    pub fn detect_with_capability(
        &self,
        capability: DetectionCapability,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<DetectionResult> {
        let backend = self.backend_for_capability(capability)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(pixels, width, height)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A registry-owned backend usable wherever a `DetectorBackend` is expected.
#[derive(Clone)]
pub struct SharedBackend(Arc<Mutex<dyn DetectorBackend>>);

impl DetectorBackend for SharedBackend {
    fn name(&self) -> &'static str {
        self.0.lock().map(|guard| guard.name()).unwrap_or("poisoned")
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        self.0
            .lock()
            .map(|guard| guard.supports(capability))
            .unwrap_or(false)
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(pixels, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.warm_up()
    }
}
