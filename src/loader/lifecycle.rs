//! Process-wide loader lifecycle.
//!
//! Hosts that want one loader per process use `initialize` once at startup
//! and `reset` between test runs. Everything else can hold a `Loader`
//! directly.

use std::sync::{Arc, RwLock};

use crate::config::LoaderConfig;
use crate::container::{ContainerRuntime, ExposedModule};
use crate::error::{Error, Result};
use crate::loader::coordinator::Loader;
use crate::remote::manifest::StatsProcessor;

static GLOBAL_LOADER: RwLock<Option<Loader>> = RwLock::new(None);

/// Create the process-wide loader, or merge `config` into the existing one.
///
/// Re-initializing keeps the existing runtime, cache and in-flight state.
/// Scopes and settings not configured yet are filled in from `config`.
pub fn initialize(config: LoaderConfig, runtime: Arc<dyn ContainerRuntime>) -> Loader {
    initialize_with(config, |config| Loader::new(config, runtime))
}

/// Like `initialize`, building the loader with `build` on first use.
pub fn initialize_with<F>(config: LoaderConfig, build: F) -> Loader
where
    F: FnOnce(LoaderConfig) -> Loader,
{
    let mut slot = GLOBAL_LOADER.write().unwrap_or_else(|e| e.into_inner());

    if let Some(existing) = slot.as_ref() {
        log::debug!("Loader already initialized; merging configuration");
        existing.configure(config);
        return existing.clone();
    }

    let loader = build(config.with_env_overrides());
    *slot = Some(loader.clone());
    loader
}

/// The process-wide loader.
pub fn current_loader() -> Result<Loader> {
    GLOBAL_LOADER
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or_else(|| Error::Config("Loader used before initialize".to_string()))
}

/// Tear down the process-wide loader and all of its state.
pub fn reset() {
    let previous = GLOBAL_LOADER
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .take();
    if let Some(loader) = previous {
        loader.reset();
    }
}

pub async fn load_module(scope: &str, module: &str) -> Result<Arc<ExposedModule>> {
    current_loader()?.load_module(scope, module).await
}

pub async fn load_module_with(
    scope: &str,
    module: &str,
    processor: StatsProcessor,
) -> Result<Arc<ExposedModule>> {
    current_loader()?.load_module_with(scope, module, processor).await
}

pub fn get_cached_module(scope: &str, module: &str) -> Option<Arc<ExposedModule>> {
    current_loader().ok()?.get_cached_module(scope, module)
}
