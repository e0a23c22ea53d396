//! Model registry: the set of classifier endpoints and their metadata.
//!
//! Every reader (dispatcher, health monitor, broadcaster) goes through this
//! store. Mutations take the write lock, so a dispatch that resolves its
//! endpoint list after a mutation returns always sees the new state.

use std::collections::HashSet;

use ensemble_core::{EndpointSeed, Error, Result};
use parking_lot::RwLock;
use tracing::info;

use crate::types::{EnabledState, EndpointUrls, ModelEndpoint, UrlKind};

/// Insertion-ordered registry of model endpoints.
pub struct ModelRegistry {
    endpoints: RwLock<Vec<ModelEndpoint>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry pre-populated from configuration.
    pub fn from_seeds(seeds: &[EndpointSeed]) -> Result<Self> {
        let registry = Self::new();
        for seed in seeds {
            registry.add(
                &seed.display_name,
                EndpointUrls {
                    predict_url: seed.predict_url.clone(),
                    train_url: seed.train_url.clone(),
                    health_url: seed.health_url.clone(),
                },
            )?;
        }
        Ok(registry)
    }

    /// Derive the registry key for a display name: lower-cased, whitespace
    /// runs collapsed to a single underscore.
    pub fn derive_key(display_name: &str) -> String {
        display_name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("_")
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Get an endpoint by key.
    pub fn get(&self, key: &str) -> Result<ModelEndpoint> {
        self.endpoints
            .read()
            .iter()
            .find(|e| e.key == key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    /// Snapshot of every endpoint, in insertion order.
    pub fn get_all(&self) -> Vec<ModelEndpoint> {
        self.endpoints.read().clone()
    }

    /// Keys of every endpoint, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.endpoints.read().iter().map(|e| e.key.clone()).collect()
    }

    /// Keys of enabled endpoints, in insertion order.
    pub fn list_enabled(&self) -> Vec<String> {
        self.endpoints
            .read()
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.endpoints.read().iter().any(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Key and enabled flag of every endpoint.
    pub fn enabled_states(&self) -> Vec<EnabledState> {
        self.endpoints
            .read()
            .iter()
            .map(|e| EnabledState {
                name: e.key.clone(),
                enabled: e.enabled,
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Register a new endpoint, enabled. Returns its key.
    pub fn add(&self, display_name: &str, urls: EndpointUrls) -> Result<String> {
        let key = Self::derive_key(display_name);
        if key.is_empty() {
            return Err(Error::InvalidFormat("model name must not be empty".into()));
        }
        for (kind, url) in [
            (UrlKind::Predict, &urls.predict_url),
            (UrlKind::Train, &urls.train_url),
            (UrlKind::Health, &urls.health_url),
        ] {
            if url.trim().is_empty() {
                return Err(Error::InvalidFormat(format!("{} URL must not be empty", kind)));
            }
        }

        let mut endpoints = self.endpoints.write();
        if endpoints.iter().any(|e| e.key == key) {
            return Err(Error::DuplicateKey(key));
        }
        endpoints.push(ModelEndpoint {
            key: key.clone(),
            display_name: display_name.trim().to_string(),
            predict_url: urls.predict_url,
            train_url: urls.train_url,
            health_url: urls.health_url,
            enabled: true,
        });
        drop(endpoints);

        info!("Model '{}' added", key);
        Ok(key)
    }

    /// Remove an endpoint. Removing an absent key fails.
    pub fn remove(&self, key: &str) -> Result<ModelEndpoint> {
        let mut endpoints = self.endpoints.write();
        let pos = endpoints
            .iter()
            .position(|e| e.key == key)
            .ok_or_else(|| not_found(key))?;
        let removed = endpoints.remove(pos);
        drop(endpoints);

        info!("Model '{}' removed", key);
        Ok(removed)
    }

    pub fn set_enabled(&self, key: &str, enabled: bool) -> Result<()> {
        self.update(key, |e| e.enabled = enabled)?;
        info!(
            "Model '{}' {}",
            key,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn set_url(&self, key: &str, kind: UrlKind, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(Error::InvalidFormat(format!("{} URL must not be empty", kind)));
        }
        self.update(key, |e| {
            let slot = match kind {
                UrlKind::Predict => &mut e.predict_url,
                UrlKind::Train => &mut e.train_url,
                UrlKind::Health => &mut e.health_url,
            };
            *slot = url.to_string();
        })?;
        info!("Model '{}' {} URL updated to {}", key, kind, url);
        Ok(())
    }

    pub fn set_display_name(&self, key: &str, display_name: &str) -> Result<()> {
        if display_name.trim().is_empty() {
            return Err(Error::InvalidFormat("display name must not be empty".into()));
        }
        self.update(key, |e| e.display_name = display_name.trim().to_string())
    }

    fn update<F: FnOnce(&mut ModelEndpoint)>(&self, key: &str, apply: F) -> Result<()> {
        let mut endpoints = self.endpoints.write();
        let endpoint = endpoints
            .iter_mut()
            .find(|e| e.key == key)
            .ok_or_else(|| not_found(key))?;
        apply(endpoint);
        Ok(())
    }

    /// Set of current keys, for status-map reconciliation.
    pub fn key_set(&self) -> HashSet<String> {
        self.endpoints.read().iter().map(|e| e.key.clone()).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(key: &str) -> Error {
    Error::NotFound(format!("model '{}'", key))
}
