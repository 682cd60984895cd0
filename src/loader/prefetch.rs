//! Prefetch coordination for cached modules.
//!
//! Only in-flight prefetches are shared. Once one settles its entry is
//! removed, and the next trigger runs the module's prefetch again.

use crate::container::{PrefetchApi, PrefetchValue};
use crate::error::Error;
use crate::loader::coordinator::Loader;
use crate::loader::pending::{self, CleanupGuard, Pending};
use crate::loader::state::ModuleKey;

impl Loader {
    /// Run the prefetch side effect of a cached module, or join the one
    /// already running for `key`.
    ///
    /// Returns `None` when the module is not cached, exposes no prefetch
    /// function, or no tokio runtime is available to drive it.
    pub fn trigger_prefetch(&self, key: &ModuleKey, api: PrefetchApi) -> Option<Pending<PrefetchValue>> {
        let (prefetch, completion, handle, runtime) = {
            let mut state = self.lock_state();

            if let Some(in_flight) = state.pending_prefetch(key) {
                log::debug!("Joining in-flight prefetch for {}", key);
                return Some(in_flight);
            }

            let prefetch = state.cached(key)?.prefetch_fn()?;
            let runtime = match tokio::runtime::Handle::try_current() {
                Ok(runtime) => runtime,
                Err(_) => {
                    log::debug!("No async runtime available; skipping prefetch for {}", key);
                    return None;
                }
            };

            let (completion, handle) = pending::channel();
            state.begin_prefetch(key.clone(), handle.clone());
            (prefetch, completion, handle, runtime)
        };

        // Invoked outside the lock so a prefetch may call back into the loader.
        let guard = CleanupGuard::new(|| self.lock_state().finish_prefetch(key, &handle));
        let future = prefetch(api);
        guard.disarm();

        let loader = self.clone();
        let key = key.clone();
        let task_handle = handle.clone();
        runtime.spawn(async move {
            let guard = CleanupGuard::new(|| {
                log::warn!("Prefetch for {} ended without settling", key);
                loader.lock_state().finish_prefetch(&key, &task_handle);
            });
            let result = future.await.map_err(|message| Error::Prefetch {
                key: key.to_string(),
                message,
            });
            guard.disarm();

            loader.lock_state().finish_prefetch(&key, &task_handle);

            if let Err(e) = &result {
                log::warn!("{}", e);
            }
            completion.settle(result);
        });

        Some(handle)
    }
}
