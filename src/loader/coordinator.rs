//! Load coordinator: the single entry point for obtaining remote modules.
//!
//! Provides the `Loader` handle which guarantees, per unique key:
//! - at most one manifest fetch and container registration per scope
//! - at most one export-table retrieval per module
//! - one shared outcome for every caller that arrives while a load is in flight

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::LoaderConfig;
use crate::container::{ContainerRuntime, ExposedModule, PrefetchApi, ScriptInjector};
use crate::error::{Error, Result};
use crate::loader::pending::{self, CleanupGuard, Completion, Pending};
use crate::loader::state::{LoaderSnapshot, LoaderState, ModuleKey, ModuleLoadState};
use crate::remote::fetch::{HttpManifestFetcher, ManifestFetcher};
use crate::remote::manifest::StatsProcessor;
use crate::remote::registry::{AppLocation, AppRegistry};
use crate::remote::resolver::ManifestResolver;

pub(crate) struct LoaderInner {
    pub(crate) state: Mutex<LoaderState>,
    config: RwLock<LoaderConfig>,
    registry: AppRegistry,
    fetcher: Arc<dyn ManifestFetcher>,
    resolver: ManifestResolver,
    runtime: Arc<dyn ContainerRuntime>,
    injector: Option<Arc<dyn ScriptInjector>>,
    pub(crate) prefetch_api: PrefetchApi,
}

/// Handle to one loader state. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Loader {
    pub(crate) inner: Arc<LoaderInner>,
}

/// Builder for a `Loader` with non-default collaborators.
pub struct LoaderBuilder {
    config: LoaderConfig,
    runtime: Arc<dyn ContainerRuntime>,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
    injector: Option<Arc<dyn ScriptInjector>>,
    prefetch_api: Option<PrefetchApi>,
}

impl LoaderBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn script_injector(mut self, injector: Arc<dyn ScriptInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Capability passed to prefetch functions triggered by the loader itself.
    pub fn prefetch_api(mut self, api: PrefetchApi) -> Self {
        self.prefetch_api = Some(api);
        self
    }

    pub fn build(self) -> Loader {
        let fetcher: Arc<dyn ManifestFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpManifestFetcher::new(&self.config)),
        };
        let prefetch_api: PrefetchApi = match self.prefetch_api {
            Some(api) => api,
            None => Arc::new(()),
        };

        Loader {
            inner: Arc::new(LoaderInner {
                state: Mutex::new(LoaderState::default()),
                registry: AppRegistry::new(self.config.apps.clone()),
                config: RwLock::new(self.config),
                resolver: ManifestResolver::new(fetcher.clone()),
                fetcher,
                runtime: self.runtime,
                injector: self.injector,
                prefetch_api,
            }),
        }
    }
}

/// How a load reaches the point where the container is registered.
enum LoadPath {
    /// Scope already registered
    Registered,
    /// Another load is registering the scope
    JoinInjection(Pending<()>),
    /// This load registers the scope
    Inject(Completion<()>, Pending<()>),
}

impl Loader {
    /// Create a loader fetching manifests over HTTP.
    pub fn new(config: LoaderConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self::builder(config, runtime).build()
    }

    pub fn builder(config: LoaderConfig, runtime: Arc<dyn ContainerRuntime>) -> LoaderBuilder {
        LoaderBuilder {
            config,
            runtime,
            fetcher: None,
            injector: None,
            prefetch_api: None,
        }
    }

    /// Merge additional configuration. Registered scopes, settings already
    /// in effect and all loaded state are left untouched.
    pub fn configure(&self, config: LoaderConfig) {
        let merged = {
            let mut current = self.inner.config.write().unwrap_or_else(|e| e.into_inner());
            let mut next = current.clone();
            next.merge(config);
            *current = next.with_env_overrides();
            current.clone()
        };

        self.inner.registry.merge(merged.apps.clone());
        self.inner.fetcher.configure(&merged);
    }

    /// Configuration currently in effect.
    pub fn config(&self) -> LoaderConfig {
        self.inner.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.inner.registry
    }

    /// Load a module, sharing the work with any concurrent request for it.
    pub async fn load_module(&self, scope: &str, module: &str) -> Result<Arc<ExposedModule>> {
        self.request_module(scope, module, None).wait().await
    }

    /// Load a module whose scope publishes raw stats handled by `processor`.
    pub async fn load_module_with(
        &self,
        scope: &str,
        module: &str,
        processor: StatsProcessor,
    ) -> Result<Arc<ExposedModule>> {
        self.request_module(scope, module, Some(processor)).wait().await
    }

    /// Start (or join) a load and return its shared handle.
    ///
    /// Cache hits return an already settled handle. Must be called from
    /// within a tokio runtime.
    pub fn request_module(
        &self,
        scope: &str,
        module: &str,
        processor: Option<StatsProcessor>,
    ) -> Pending<Arc<ExposedModule>> {
        let key = ModuleKey::new(scope, module);

        let (path, completion, handle, generation) = {
            let mut state = self.lock_state();

            if let Some(cached) = state.cached(&key) {
                log::debug!("Cache hit for {}", key);
                return Pending::ready(cached);
            }

            if let Some(in_flight) = state.pending_load(&key) {
                log::debug!("Joining in-flight load for {}", key);
                return in_flight;
            }

            let path = if state.is_known(scope) {
                LoadPath::Registered
            } else if let Some(injection) = state.pending_injection(scope) {
                LoadPath::JoinInjection(injection)
            } else {
                let (completion, injection) = pending::channel();
                state.begin_injection(scope, injection.clone());
                LoadPath::Inject(completion, injection)
            };

            let (completion, handle) = pending::channel();
            state.begin_load(key.clone(), handle.clone());
            (path, completion, handle, state.generation())
        };

        let loader = self.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            loader
                .run_load(key, path, processor, completion, task_handle, generation)
                .await;
        });

        handle
    }

    /// Synchronous cache lookup. A hit also triggers the module's prefetch.
    pub fn get_cached_module(&self, scope: &str, module: &str) -> Option<Arc<ExposedModule>> {
        let key = ModuleKey::new(scope, module);
        let cached = self.lock_state().cached(&key)?;
        if cached.has_prefetch() {
            self.trigger_prefetch(&key, self.inner.prefetch_api.clone());
        }
        Some(cached)
    }

    pub fn module_state(&self, scope: &str, module: &str) -> ModuleLoadState {
        self.lock_state().module_state(&ModuleKey::new(scope, module))
    }

    pub fn is_scope_known(&self, scope: &str) -> bool {
        self.lock_state().is_known(scope)
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        let mut snapshot = self.lock_state().snapshot();
        snapshot.registered_scopes = self.inner.registry.scopes();
        snapshot
    }

    /// Drop the cache, known scopes and all pending registries.
    ///
    /// Operations already running still settle their callers but no longer
    /// write into the loader.
    pub fn reset(&self) {
        log::debug!("Resetting loader state");
        self.lock_state().clear();
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_load(
        self,
        key: ModuleKey,
        path: LoadPath,
        processor: Option<StatsProcessor>,
        completion: Completion<Arc<ExposedModule>>,
        handle: Pending<Arc<ExposedModule>>,
        generation: u64,
    ) {
        let guard = CleanupGuard::new(|| {
            log::warn!("Load of {} ended without settling", key);
            self.lock_state().finish_load(&key, &handle);
        });
        let result = self
            .load_pipeline(&key, path, processor.as_ref(), generation)
            .await;
        guard.disarm();

        {
            let mut state = self.lock_state();
            if let Ok(module) = &result {
                if state.generation() == generation {
                    state.cache_module(key.clone(), module.clone());
                }
            }
            state.finish_load(&key, &handle);
        }

        match &result {
            Ok(_) => log::debug!("Loaded {}", key),
            Err(e) => log::warn!("Failed to load {}: {}", key, e),
        }

        completion.settle(result);
    }

    async fn load_pipeline(
        &self,
        key: &ModuleKey,
        path: LoadPath,
        processor: Option<&StatsProcessor>,
        generation: u64,
    ) -> Result<Arc<ExposedModule>> {
        match path {
            LoadPath::Registered => {}
            LoadPath::JoinInjection(injection) => injection.wait().await?,
            LoadPath::Inject(completion, handle) => {
                let guard = CleanupGuard::new(|| {
                    self.lock_state().finish_injection(key.scope(), &handle);
                });
                let result = self
                    .register_container(key.scope(), key.module(), processor)
                    .await;
                guard.disarm();

                {
                    let mut state = self.lock_state();
                    if result.is_ok() && state.generation() == generation {
                        state.mark_known(key.scope());
                    }
                    state.finish_injection(key.scope(), &handle);
                }

                completion.settle(result.clone());
                result?;
            }
        }

        let module = self
            .inner
            .runtime
            .get_export(key.scope(), key.module())
            .await?;
        Ok(Arc::new(module))
    }

    async fn register_container(
        &self,
        scope: &str,
        module_hint: &str,
        processor: Option<&StatsProcessor>,
    ) -> Result<()> {
        let metadata = self.inner.registry.get(scope)?;

        if let AppLocation::Script(url) = metadata.location(scope)? {
            let injector = self.inner.injector.as_ref().ok_or_else(|| {
                Error::Config(format!(
                    "Scope '{}' is script-only but no script injector is configured",
                    scope
                ))
            })?;
            injector.inject(scope, &url).await?;
            self.inner.runtime.init_container(scope).await?;
            log::info!("Initialized container '{}' from {}", scope, url);
            return Ok(());
        }

        let manifest = self
            .inner
            .resolver
            .resolve(scope, module_hint, &metadata, processor)
            .await?;
        self.inner.runtime.register(&manifest).await?;

        log::info!(
            "Registered container '{}' version {} ({} scripts)",
            manifest.name,
            manifest.version,
            manifest.load_scripts.len()
        );
        Ok(())
    }
}
