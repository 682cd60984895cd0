//! Container runtime seam and the export tables it hands back.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::remote::manifest::CanonicalManifest;

/// A single exported value.
pub type ExportValue = Arc<dyn Any + Send + Sync>;

/// Host capability handed to a module's prefetch function.
pub type PrefetchApi = Arc<dyn Any + Send + Sync>;

/// Value produced by a prefetch side effect.
pub type PrefetchValue = serde_json::Value;

pub type PrefetchFuture =
    Pin<Box<dyn Future<Output = std::result::Result<PrefetchValue, String>> + Send>>;

pub type PrefetchFn = Arc<dyn Fn(PrefetchApi) -> PrefetchFuture + Send + Sync>;

/// Export table of one module inside a remote container.
#[derive(Clone, Default)]
pub struct ExposedModule {
    exports: HashMap<String, ExportValue>,
    prefetch: Option<PrefetchFn>,
}

impl ExposedModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.exports.insert(name.into(), Arc::new(value));
        self
    }

    /// Attach a prefetch side effect.
    pub fn with_prefetch<F, Fut>(mut self, prefetch: F) -> Self
    where
        F: Fn(PrefetchApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<PrefetchValue, String>> + Send + 'static,
    {
        self.prefetch = Some(Arc::new(move |api: PrefetchApi| -> PrefetchFuture {
            Box::pin(prefetch(api))
        }));
        self
    }

    pub fn export(&self, name: &str) -> Option<&ExportValue> {
        self.exports.get(name)
    }

    /// Typed access to an export.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.exports.get(name)?.downcast_ref::<T>()
    }

    pub fn export_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.exports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_prefetch(&self) -> bool {
        self.prefetch.is_some()
    }

    pub(crate) fn prefetch_fn(&self) -> Option<PrefetchFn> {
        self.prefetch.clone()
    }
}

impl fmt::Debug for ExposedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposedModule")
            .field("exports", &self.export_names())
            .field("prefetch", &self.has_prefetch())
            .finish()
    }
}

/// Executes remote bundles and exposes their modules.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Load and execute the bundle described by `manifest`.
    async fn register(&self, manifest: &CanonicalManifest) -> Result<()>;

    /// Fetch the export table of `module` from the registered `scope`.
    ///
    /// Returns `Error::NotFound` when the remote does not expose the module.
    async fn get_export(&self, scope: &str, module: &str) -> Result<ExposedModule>;

    /// Initialize a container whose entry script was injected directly.
    async fn init_container(&self, _scope: &str) -> Result<()> {
        Ok(())
    }
}

/// Loads an entry script for scopes configured without a manifest.
#[async_trait]
pub trait ScriptInjector: Send + Sync {
    async fn inject(&self, id: &str, url: &str) -> Result<()>;
}
