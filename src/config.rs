//! Loader configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Result;
use crate::remote::registry::AppMetadata;

/// Configuration passed to `initialize` / `Loader::new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Registered remotes by scope
    #[serde(default)]
    pub apps: HashMap<String, AppMetadata>,
    /// Base for relative manifest locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            apps: HashMap::new(),
            base_url: None,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl LoaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register a single scope.
    pub fn with_app(mut self, scope: impl Into<String>, metadata: AppMetadata) -> Self {
        self.apps.insert(scope.into(), metadata);
        self
    }

    /// Apply `REMOTE_MODULES_BASE_URL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var(defaults::BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                log::debug!("Using base URL from {}: {}", defaults::BASE_URL_ENV, base_url);
                self.base_url = Some(base_url);
            }
        }
        self
    }

    /// Fold `other` into this config without overwriting anything already set.
    ///
    /// A timeout still at its default counts as unset.
    pub fn merge(&mut self, other: LoaderConfig) {
        for (scope, metadata) in other.apps {
            self.apps.entry(scope).or_insert(metadata);
        }
        if self.base_url.is_none() {
            self.base_url = other.base_url;
        }
        if self.request_timeout_secs == defaults::REQUEST_TIMEOUT_SECS {
            self.request_timeout_secs = other.request_timeout_secs;
        }
    }
}
