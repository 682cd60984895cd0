//! Manifest shapes and normalization into the canonical form.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::error::{Error, Result};

/// Normalized descriptor of a remote container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalManifest {
    pub name: String,
    pub version: String,
    pub extensions: Vec<Value>,
    #[serde(rename = "loadScripts")]
    pub load_scripts: Vec<String>,
    #[serde(rename = "baseURL", default = "defaults::base_url")]
    pub base_url: String,
    #[serde(rename = "registrationMethod", default = "defaults::registration_method")]
    pub registration_method: String,
}

/// Extracts ordered entry-script paths from raw federation stats.
///
/// Receives the scope and the raw stats document.
pub type StatsProcessor = Arc<dyn Fn(&str, &Value) -> Result<Vec<String>> + Send + Sync>;

/// A manifest as found on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Canonical(CanonicalManifest),
    RawStats(Value),
}

impl Manifest {
    /// Classify a parsed document by its shape.
    pub fn classify(value: Value) -> Result<Self> {
        if is_canonical_shape(&value) {
            let manifest = serde_json::from_value(value)?;
            Ok(Manifest::Canonical(manifest))
        } else {
            Ok(Manifest::RawStats(value))
        }
    }

    /// Produce a canonical manifest, running `processor` over raw stats.
    pub fn into_canonical(
        self,
        scope: &str,
        processor: Option<&StatsProcessor>,
        assets_host: Option<&str>,
    ) -> Result<CanonicalManifest> {
        match self {
            Manifest::Canonical(manifest) => Ok(manifest),
            Manifest::RawStats(stats) => {
                let scripts = match processor {
                    Some(processor) => processor(scope, &stats)?,
                    None => default_processor(scope, &stats)?,
                };
                from_stats(scope, &stats, scripts, assets_host)
            }
        }
    }
}

/// String `name`, string `version`, array `extensions`, array `loadScripts`.
pub fn is_canonical_shape(value: &Value) -> bool {
    value.get("name").is_some_and(Value::is_string)
        && value.get("version").is_some_and(Value::is_string)
        && value.get("extensions").is_some_and(Value::is_array)
        && value.get("loadScripts").is_some_and(Value::is_array)
}

/// Default extractor for webpack-style stats.
///
/// Reads `assetsByChunkName[scope]` (a file name or a list of them), keeps
/// the `.js` entries and prefixes each with `publicPath` when present.
pub fn default_processor(scope: &str, stats: &Value) -> Result<Vec<String>> {
    let assets = stats
        .get("assetsByChunkName")
        .and_then(|chunks| chunks.get(scope))
        .ok_or_else(|| {
            Error::Parse(format!(
                "Stats contain no assetsByChunkName entry for scope '{}'",
                scope
            ))
        })?;

    let files: Vec<&str> = match assets {
        Value::String(file) => vec![file.as_str()],
        Value::Array(files) => files.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let public_path = stats
        .get("publicPath")
        .and_then(Value::as_str)
        .filter(|p| *p != "auto")
        .unwrap_or("");

    Ok(files
        .into_iter()
        .filter(|file| file.ends_with(".js"))
        .map(|file| format!("{}{}", public_path, file))
        .collect())
}

fn from_stats(
    scope: &str,
    stats: &Value,
    scripts: Vec<String>,
    assets_host: Option<&str>,
) -> Result<CanonicalManifest> {
    let first = scripts.first().ok_or_else(|| {
        Error::Parse(format!("No entry scripts found for scope '{}'", scope))
    })?;

    let base = base_url_of(first);
    let load_scripts = scripts
        .iter()
        .map(|script| relative_to(script, &base))
        .collect();

    let base_url = match assets_host {
        Some(host) if !is_absolute(&base) => join_host(host, &base),
        _ => base,
    };

    Ok(CanonicalManifest {
        name: stats
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(scope)
            .to_string(),
        version: stats
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("0.0.0")
            .to_string(),
        extensions: Vec::new(),
        load_scripts,
        base_url,
        registration_method: defaults::CUSTOM_REGISTRATION.to_string(),
    })
}

/// Strip the final path segment, keeping the trailing slash. Never empty.
pub fn base_url_of(path: &str) -> String {
    let path_start = path.find("://").map(|i| i + 3).unwrap_or(0);
    let base = match path[path_start..].rfind('/') {
        Some(i) => path[..path_start + i + 1].to_string(),
        None if path_start > 0 => format!("{}/", path),
        None => String::new(),
    };
    if base.is_empty() {
        defaults::ROOT_BASE_URL.to_string()
    } else {
        base
    }
}

fn relative_to(path: &str, base: &str) -> String {
    path.strip_prefix(base).unwrap_or(path).to_string()
}

fn is_absolute(url: &str) -> bool {
    url.contains("://") || url.starts_with("//")
}

fn join_host(host: &str, base: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        base.trim_start_matches('/')
    )
}
