//! Loader bookkeeping: module cache, known scopes and in-flight registries.
//!
//! Every method here is synchronous. Callers hold the state lock for the
//! duration of one decision and never across an await.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::container::{ExposedModule, PrefetchValue};
use crate::defaults::KEY_SEPARATOR;
use crate::loader::pending::Pending;

/// `(scope, module)` pair identifying a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    scope: String,
    module: String,
}

impl ModuleKey {
    pub fn new(scope: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            module: module.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scope, KEY_SEPARATOR, self.module)
    }
}

/// Observable load state of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleLoadState {
    /// Neither cached nor in flight
    Idle,
    /// A load is in flight
    Loading,
    /// Export table is cached
    Ready,
}

impl fmt::Display for ModuleLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Loading => write!(f, "LOADING"),
            Self::Ready => write!(f, "READY"),
        }
    }
}

/// Point-in-time view of the loader state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSnapshot {
    pub registered_scopes: Vec<String>,
    pub cached_modules: Vec<String>,
    pub known_scopes: Vec<String>,
    pub pending_injections: Vec<String>,
    pub pending_loads: Vec<String>,
    pub pending_prefetches: Vec<String>,
}

#[derive(Default)]
pub(crate) struct LoaderState {
    /// Bumped on every reset; tasks from an older generation leave state alone
    generation: u64,
    cache: HashMap<ModuleKey, Arc<ExposedModule>>,
    known_scopes: HashSet<String>,
    injections: HashMap<String, Pending<()>>,
    loads: HashMap<ModuleKey, Pending<Arc<ExposedModule>>>,
    prefetches: HashMap<ModuleKey, Pending<PrefetchValue>>,
}

impl LoaderState {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cached(&self, key: &ModuleKey) -> Option<Arc<ExposedModule>> {
        self.cache.get(key).cloned()
    }

    /// Cache entries are written once and never replaced.
    pub(crate) fn cache_module(&mut self, key: ModuleKey, module: Arc<ExposedModule>) {
        self.cache.entry(key).or_insert(module);
    }

    pub(crate) fn is_known(&self, scope: &str) -> bool {
        self.known_scopes.contains(scope)
    }

    pub(crate) fn mark_known(&mut self, scope: &str) {
        self.known_scopes.insert(scope.to_string());
    }

    pub(crate) fn pending_injection(&self, scope: &str) -> Option<Pending<()>> {
        self.injections.get(scope).cloned()
    }

    pub(crate) fn begin_injection(&mut self, scope: &str, pending: Pending<()>) {
        self.injections.insert(scope.to_string(), pending);
    }

    pub(crate) fn finish_injection(&mut self, scope: &str, pending: &Pending<()>) {
        remove_if_same(&mut self.injections, scope, pending);
    }

    pub(crate) fn pending_load(&self, key: &ModuleKey) -> Option<Pending<Arc<ExposedModule>>> {
        self.loads.get(key).cloned()
    }

    pub(crate) fn begin_load(&mut self, key: ModuleKey, pending: Pending<Arc<ExposedModule>>) {
        self.loads.insert(key, pending);
    }

    pub(crate) fn finish_load(&mut self, key: &ModuleKey, pending: &Pending<Arc<ExposedModule>>) {
        remove_if_same(&mut self.loads, key, pending);
    }

    pub(crate) fn pending_prefetch(&self, key: &ModuleKey) -> Option<Pending<PrefetchValue>> {
        self.prefetches.get(key).cloned()
    }

    pub(crate) fn begin_prefetch(&mut self, key: ModuleKey, pending: Pending<PrefetchValue>) {
        self.prefetches.insert(key, pending);
    }

    pub(crate) fn finish_prefetch(&mut self, key: &ModuleKey, pending: &Pending<PrefetchValue>) {
        remove_if_same(&mut self.prefetches, key, pending);
    }

    pub(crate) fn module_state(&self, key: &ModuleKey) -> ModuleLoadState {
        if self.cache.contains_key(key) {
            ModuleLoadState::Ready
        } else if self.loads.contains_key(key) {
            ModuleLoadState::Loading
        } else {
            ModuleLoadState::Idle
        }
    }

    /// Drop everything and start a new generation.
    pub(crate) fn clear(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    pub(crate) fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            registered_scopes: Vec::new(),
            cached_modules: sorted(self.cache.keys().map(ModuleKey::to_string)),
            known_scopes: sorted(self.known_scopes.iter().cloned()),
            pending_injections: sorted(self.injections.keys().cloned()),
            pending_loads: sorted(self.loads.keys().map(ModuleKey::to_string)),
            pending_prefetches: sorted(self.prefetches.keys().map(ModuleKey::to_string)),
        }
    }
}

fn remove_if_same<K, Q, T>(map: &mut HashMap<K, Pending<T>>, key: &Q, pending: &Pending<T>)
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    if map.get(key).is_some_and(|current| current.same_operation(pending)) {
        map.remove(key);
    }
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<_> = items.collect();
    items.sort();
    items
}
