//! Remote modules - load, cache and deduplicate independently deployed
//! module federation containers.

mod defaults;
pub mod error;

pub mod config;
pub mod container;
pub mod loader;
pub mod remote;

pub use error::{Error, Result};

pub use config::LoaderConfig;

pub use container::{
    ContainerRuntime, ExportValue, ExposedModule, PrefetchApi, PrefetchFn, PrefetchFuture,
    PrefetchValue, ScriptInjector,
};

pub use loader::lifecycle::{
    current_loader, get_cached_module, initialize, initialize_with, load_module, load_module_with,
    reset,
};
pub use loader::{Loader, LoaderBuilder, LoaderSnapshot, ModuleKey, ModuleLoadState, Pending};

pub use remote::{
    AppLocation, AppMetadata, AppRegistry, CanonicalManifest, HttpManifestFetcher, HttpResponse,
    Manifest, ManifestFetcher, ManifestResolver, StatsProcessor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
