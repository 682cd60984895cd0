//! Shared completion handles for in-flight operations.
//!
//! A `Pending<T>` is cloned out to every caller coalesced onto the same
//! operation. The single `Completion<T>` owned by the running task settles
//! all of them at once.

use std::fmt;

use tokio::sync::watch;

use crate::error::{Error, Result};

type Slot<T> = Option<Result<T>>;

/// Handle to an operation that settles once with a value or an error.
pub struct Pending<T> {
    rx: watch::Receiver<Slot<T>>,
}

/// Settling side of a `Pending`.
pub(crate) struct Completion<T> {
    tx: watch::Sender<Slot<T>>,
}

pub(crate) fn channel<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = watch::channel(None);
    (Completion { tx }, Pending { rx })
}

impl<T> Completion<T> {
    pub(crate) fn settle(self, result: Result<T>) {
        self.tx.send_replace(Some(result));
    }
}

impl<T> Pending<T> {
    /// An already settled handle.
    pub fn ready(value: T) -> Self {
        let (_tx, rx) = watch::channel(Some(Ok(value)));
        Self { rx }
    }

    /// Whether both handles observe the same operation.
    pub fn same_operation(&self, other: &Pending<T>) -> bool {
        self.rx.same_channel(&other.rx)
    }

    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

impl<T: Clone> Pending<T> {
    /// Wait for the operation to settle.
    ///
    /// If the owning task went away without settling, this is an
    /// `Execution` error.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.rx.clone();
        let settled = rx.wait_for(Option::is_some).await.map(|slot| (*slot).clone());
        match settled {
            Ok(Some(result)) => result,
            _ => Err(Error::Execution(
                "operation ended without settling".to_string(),
            )),
        }
    }
}

/// Runs its cleanup on drop unless disarmed.
///
/// Held by a task across collaborator calls. If one of them panics the task
/// is dropped without settling and the cleanup still clears its registry
/// entry.
pub(crate) struct CleanupGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> CleanupGuard<F> {
    pub(crate) fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    pub(crate) fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for CleanupGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("settled", &self.is_settled())
            .finish()
    }
}
