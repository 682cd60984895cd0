//! Registry of remote applications and where their bundles live.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Static descriptor of one remote scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    /// Entry script for containers loaded without a manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_location: Option<String>,
    /// URL of the manifest (canonical or raw federation stats)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_location: Option<String>,
    /// Manifest supplied inline, skipping network I/O
    #[serde(default, rename = "manifest", skip_serializing_if = "Option::is_none")]
    pub presupplied_manifest: Option<serde_json::Value>,
    /// Host prepended to relative base URLs derived from raw stats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_host: Option<String>,
}

/// How a scope's container is located, in order of precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum AppLocation {
    Presupplied(serde_json::Value),
    Manifest(String),
    Script(String),
}

impl AppMetadata {
    pub fn with_manifest_location(location: impl Into<String>) -> Self {
        Self {
            manifest_location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_script_location(location: impl Into<String>) -> Self {
        Self {
            script_location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_presupplied_manifest(manifest: serde_json::Value) -> Self {
        Self {
            presupplied_manifest: Some(manifest),
            ..Self::default()
        }
    }

    /// Pick the location used to load this scope.
    pub fn location(&self, scope: &str) -> Result<AppLocation> {
        if let Some(manifest) = &self.presupplied_manifest {
            return Ok(AppLocation::Presupplied(manifest.clone()));
        }
        if let Some(url) = non_empty(&self.manifest_location) {
            return Ok(AppLocation::Manifest(url.to_string()));
        }
        if let Some(url) = non_empty(&self.script_location) {
            return Ok(AppLocation::Script(url.to_string()));
        }
        Err(Error::Config(format!(
            "Scope '{}' has no script location, manifest location or manifest",
            scope
        )))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Mapping from scope name to its metadata.
///
/// Read-only to the load pipeline; callers extend it through `merge`.
#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: RwLock<HashMap<String, AppMetadata>>,
}

impl AppRegistry {
    pub fn new(apps: HashMap<String, AppMetadata>) -> Self {
        Self {
            apps: RwLock::new(apps),
        }
    }

    /// Look up the metadata for a scope.
    pub fn get(&self, scope: &str) -> Result<AppMetadata> {
        let apps = self.apps.read().unwrap_or_else(|e| e.into_inner());
        apps.get(scope)
            .cloned()
            .ok_or_else(|| Error::Config(format!("Scope '{}' is not registered", scope)))
    }

    pub fn contains(&self, scope: &str) -> bool {
        let apps = self.apps.read().unwrap_or_else(|e| e.into_inner());
        apps.contains_key(scope)
    }

    /// Add scopes that are not registered yet. Existing entries are kept.
    pub fn merge(&self, incoming: HashMap<String, AppMetadata>) {
        let mut apps = self.apps.write().unwrap_or_else(|e| e.into_inner());
        for (scope, metadata) in incoming {
            apps.entry(scope).or_insert(metadata);
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        let apps = self.apps.read().unwrap_or_else(|e| e.into_inner());
        let mut scopes: Vec<_> = apps.keys().cloned().collect();
        scopes.sort();
        scopes
    }
}
