//! Engine Registry module.
//!
//! Holds the runtime-mutable configuration of every inference engine.

mod engine;
mod error;

pub use engine::*;
pub use error::*;

use crate::config::EngineConfig;
use dashmap::DashMap;
use std::sync::Arc;

/// The Engine Registry stores the committed settings of all known engines.
///
/// Each entry is an `Arc<EngineSettings>` snapshot that is replaced whole on
/// update. Readers clone the `Arc` and keep a consistent view for as long as
/// they need it, even if the engine is reconfigured concurrently.
///
/// # Examples
///
/// ```
/// use gateway::registry::{EngineRegistry, EngineSettings, EngineUpdate};
///
/// let registry = EngineRegistry::new();
/// registry
///     .add_engine(EngineSettings::new("fast-local", "http://localhost:8080", "qwen2.5-7b"))
///     .unwrap();
///
/// let update = EngineUpdate { enabled: Some(false), ..Default::default() };
/// registry.update_engine("fast-local", &update).unwrap();
/// assert!(!registry.is_enabled("fast-local"));
/// ```
pub struct EngineRegistry {
    engines: DashMap<String, Arc<EngineSettings>>,
}

impl EngineRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    /// Build a registry from the `[[engines]]` configuration section.
    pub fn from_config(engines: &[EngineConfig]) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for config in engines {
            registry.add_engine(EngineSettings::from(config))?;
            tracing::info!(
                engine = %config.name,
                url = %config.url,
                model = %config.model,
                max_concurrent = config.max_concurrent,
                "Registered engine from config"
            );
        }
        Ok(registry)
    }

    /// Add a new engine.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateEngine` if an engine with the same name exists.
    pub fn add_engine(&self, settings: EngineSettings) -> Result<(), RegistryError> {
        match self.engines.entry(settings.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::DuplicateEngine(settings.name))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(settings));
                Ok(())
            }
        }
    }

    /// Get the latest committed settings for an engine.
    pub fn get(&self, name: &str) -> Option<Arc<EngineSettings>> {
        self.engines.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether the engine exists and is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.engines
            .get(name)
            .map(|entry| entry.value().enabled)
            .unwrap_or(false)
    }

    /// Names of all registered engines, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshots of all registered engines, sorted by name.
    pub fn all(&self) -> Vec<Arc<EngineSettings>> {
        let mut all: Vec<Arc<EngineSettings>> = self
            .engines
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Get the number of registered engines.
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Apply a partial update and commit it as a new snapshot.
    ///
    /// Returns the committed snapshot. The swap happens under the entry's
    /// shard lock, which is never held across I/O.
    pub fn update_engine(
        &self,
        name: &str,
        update: &EngineUpdate,
    ) -> Result<Arc<EngineSettings>, RegistryError> {
        self.update_engine_with(name, update, |_| {})
    }

    /// Apply an update and run `on_commit` with the new settings before the
    /// entry is unlocked. Concurrent updates to the same engine run their
    /// hooks in commit order.
    pub fn update_engine_with<F>(
        &self,
        name: &str,
        update: &EngineUpdate,
        on_commit: F,
    ) -> Result<Arc<EngineSettings>, RegistryError>
    where
        F: FnOnce(&EngineSettings),
    {
        let mut entry = self
            .engines
            .get_mut(name)
            .ok_or_else(|| RegistryError::EngineNotFound(name.to_string()))?;

        let next = update
            .apply_to(entry.value())
            .map_err(|message| RegistryError::InvalidUpdate {
                name: name.to_string(),
                message,
            })?;

        let next = Arc::new(next);
        *entry.value_mut() = Arc::clone(&next);
        on_commit(&next);
        drop(entry);

        tracing::info!(
            engine = %name,
            enabled = next.enabled,
            model = %next.model,
            max_concurrent = next.max_concurrent,
            "Engine configuration updated"
        );
        Ok(next)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
