//! Service cache mapping service name -> version -> endpoints

use crate::{CoreError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Ordered copy of the whole cache, used for diagnostics
pub type Snapshot = BTreeMap<String, BTreeMap<String, Vec<String>>>;

type Versions = HashMap<String, Arc<Vec<String>>>;

/// ServiceCache holds every known endpoint keyed by service name and version.
///
/// Endpoint lists are shared with readers as `Arc`s; writers copy on write, so
/// a list handed out by [`ServiceCache::lookup`] never changes underneath the
/// caller.
#[derive(Debug, Default)]
pub struct ServiceCache {
    services: RwLock<HashMap<String, Versions>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the endpoints registered for `name`/`version`
    pub fn lookup(&self, name: &str, version: &str) -> Result<Arc<Vec<String>>> {
        let services = self.services.read();
        services
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
            .ok_or_else(|| CoreError::ServiceNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Append an endpoint, creating the service and version as needed.
    /// Duplicates are kept.
    pub fn add(&self, name: &str, version: &str, endpoint: &str) {
        let mut services = self.services.write();
        let endpoints = services
            .entry(name.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default();
        Arc::make_mut(endpoints).push(endpoint.to_string());

        debug!("Added endpoint {} to {}/{}", endpoint, name, version);
    }

    /// Remove every occurrence of `endpoint` from `name`/`version`
    pub fn delete_endpoint(&self, name: &str, version: &str, endpoint: &str) {
        let mut services = self.services.write();
        let Some(endpoints) = services
            .get_mut(name)
            .and_then(|versions| versions.get_mut(version))
        else {
            return;
        };

        if endpoints.iter().any(|e| e == endpoint) {
            Arc::make_mut(endpoints).retain(|e| e != endpoint);
            debug!("Removed endpoint {} from {}/{}", endpoint, name, version);
        }
    }

    /// Remove a version and all of its endpoints
    pub fn delete_version(&self, name: &str, version: &str) {
        let mut services = self.services.write();
        if let Some(versions) = services.get_mut(name) {
            if versions.remove(version).is_some() {
                debug!("Removed version {}/{}", name, version);
            }
        }
    }

    /// Remove a service and every version under it
    pub fn delete_service(&self, name: &str) {
        let mut services = self.services.write();
        if services.remove(name).is_some() {
            debug!("Removed service {}", name);
        }
    }

    /// Copy the full mapping in a stable order
    pub fn snapshot(&self) -> Snapshot {
        let services = self.services.read();
        services
            .iter()
            .map(|(name, versions)| {
                let versions = versions
                    .iter()
                    .map(|(version, endpoints)| (version.clone(), endpoints.to_vec()))
                    .collect();
                (name.clone(), versions)
            })
            .collect()
    }

    /// Render the snapshot as JSON, e.g. `{"name":{"version":["addr"]}}`
    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string(&snapshot).unwrap_or_else(|_| format!("{:?}", snapshot))
    }

    /// Get count of known services
    pub fn service_count(&self) -> usize {
        self.services.read().len()
    }
}
