//! Manifest resolution for remote scopes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::remote::fetch::{HttpResponse, ManifestFetcher};
use crate::remote::manifest::{is_canonical_shape, CanonicalManifest, Manifest, StatsProcessor};
use crate::remote::registry::{AppLocation, AppMetadata};

/// Produces a canonical manifest for a scope from its registry metadata.
pub struct ManifestResolver {
    fetcher: Arc<dyn ManifestFetcher>,
}

impl ManifestResolver {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve the manifest for `scope`.
    ///
    /// # Arguments
    /// * `scope` - Remote scope being loaded
    /// * `module_hint` - Module that triggered the load, used in diagnostics
    /// * `metadata` - Registry entry for the scope
    /// * `processor` - Extractor for raw stats; the default one is used if absent
    pub async fn resolve(
        &self,
        scope: &str,
        module_hint: &str,
        metadata: &AppMetadata,
        processor: Option<&StatsProcessor>,
    ) -> Result<CanonicalManifest> {
        let location = match metadata.location(scope)? {
            AppLocation::Presupplied(manifest) => {
                return Self::validate_presupplied(scope, manifest);
            }
            AppLocation::Manifest(location) => location,
            AppLocation::Script(_) => {
                return Err(Error::Config(format!(
                    "Scope '{}' has no manifest to resolve",
                    scope
                )));
            }
        };

        log::debug!(
            "Fetching manifest for scope '{}' (requested by '{}') from {}",
            scope,
            module_hint,
            location
        );

        let response = self.fetcher.fetch(&location).await?;
        let document = Self::parse_response(scope, &location, response)?;

        Manifest::classify(document)?.into_canonical(
            scope,
            processor,
            metadata.assets_host.as_deref(),
        )
    }

    fn validate_presupplied(scope: &str, manifest: serde_json::Value) -> Result<CanonicalManifest> {
        if !is_canonical_shape(&manifest) {
            return Err(Error::Parse(format!(
                "Manifest supplied for scope '{}' must have string name and version and array extensions and loadScripts",
                scope
            )));
        }
        Ok(serde_json::from_value(manifest)?)
    }

    fn parse_response(
        scope: &str,
        location: &str,
        response: HttpResponse,
    ) -> Result<serde_json::Value> {
        if !response.is_success() {
            let detail = match serde_json::from_slice::<serde_json::Value>(&response.body) {
                Ok(payload) => format!(
                    "{} {}: {}",
                    response.status, response.status_text, payload
                ),
                Err(_) => format!("{} {}", response.status, response.status_text),
            };
            return Err(Error::Network(format!(
                "Manifest request for scope '{}' to {} failed with {}",
                scope,
                location,
                detail.trim_end()
            )));
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            Error::Parse(format!(
                "Manifest for scope '{}' at {} is not valid JSON: {}",
                scope, location, e
            ))
        })
    }
}
