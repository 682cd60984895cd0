//! Manifest fetching over HTTP.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Url};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};

/// Raw HTTP response for a manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the GET for a manifest location.
///
/// Transport failures are `Network` errors. Non-2xx statuses are returned as
/// responses so the resolver can build its diagnostic.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<HttpResponse>;

    /// Pick up configuration merged into the loader after construction.
    fn configure(&self, _config: &LoaderConfig) {}
}

/// Settings read on every request so later configuration takes effect.
struct FetchSettings {
    base_url: Option<Url>,
    timeout: Duration,
}

impl FetchSettings {
    fn from_config(config: &LoaderConfig) -> Self {
        let base_url = config.base_url.as_deref().and_then(|base| match Url::parse(base) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Ignoring invalid base URL '{}': {}", base, e);
                None
            }
        });

        Self {
            base_url,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// `reqwest`-backed fetcher sending no-cache directives.
pub struct HttpManifestFetcher {
    client: Client,
    settings: RwLock<FetchSettings>,
}

impl HttpManifestFetcher {
    pub fn new(config: &LoaderConfig) -> Self {
        let client = match Client::builder().build() {
            Ok(client) => client,
            Err(e) => {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            }
        };

        Self {
            client,
            settings: RwLock::new(FetchSettings::from_config(config)),
        }
    }

    /// Per-request timeout currently in effect.
    pub fn timeout(&self) -> Duration {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).timeout
    }

    /// Resolve a possibly relative location against the configured base URL.
    pub fn resolve_url(&self, location: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(location) {
            return Ok(url);
        }
        let base_url = self
            .settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .base_url
            .clone();
        match &base_url {
            Some(base) => base.join(location).map_err(|e| {
                Error::Config(format!("Cannot resolve '{}' against {}: {}", location, base, e))
            }),
            None => Err(Error::Config(format!(
                "Relative manifest location '{}' requires a base URL",
                location
            ))),
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, location: &str) -> Result<HttpResponse> {
        let url = self.resolve_url(location)?;
        let timeout = self.timeout();

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch manifest from {}: {}", url, e)))?;

        let status = response.status();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body: body.to_vec(),
        })
    }

    fn configure(&self, config: &LoaderConfig) {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        *settings = FetchSettings::from_config(config);
    }
}
