//! Error types for remote module loading.

use thiserror::Error;

/// Loader error type.
///
/// Every variant owns its message so a single failure can be cloned out to
/// all callers coalesced onto the same in-flight operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Scope has no resolvable location, or the loader was not initialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest fetch failed or returned a non-2xx status
    #[error("Network error: {0}")]
    Network(String),

    /// Body is not valid JSON, or a manifest failed shape validation
    #[error("Parse error: {0}")]
    Parse(String),

    /// Container runtime failed to register or execute a remote bundle
    #[error("Execution error: {0}")]
    Execution(String),

    /// Module is not exposed by the remote container
    #[error("Module '{module}' not found in scope '{scope}'")]
    NotFound { scope: String, module: String },

    /// A module's prefetch side effect rejected
    #[error("Prefetch for '{key}' failed: {message}")]
    Prefetch { key: String, message: String },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;
