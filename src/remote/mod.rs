//! Remote scope metadata and manifest handling.

pub mod fetch;
pub mod manifest;
pub mod registry;
pub mod resolver;

pub use fetch::{HttpManifestFetcher, HttpResponse, ManifestFetcher};
pub use manifest::{CanonicalManifest, Manifest, StatsProcessor};
pub use registry::{AppLocation, AppMetadata, AppRegistry};
pub use resolver::ManifestResolver;
