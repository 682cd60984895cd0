//! Load coordination for remote modules.
//!
//! This module provides:
//! - Shared completion handles for in-flight work (`pending`)
//! - Cache and pending-operation bookkeeping (`state`)
//! - The load pipeline itself (`coordinator`)
//! - Prefetch deduplication (`prefetch`)
//! - The optional process-wide loader (`lifecycle`)

pub mod coordinator;
pub mod lifecycle;
pub mod pending;
mod prefetch;
pub mod state;

pub use coordinator::{Loader, LoaderBuilder};
pub use pending::Pending;
pub use state::{LoaderSnapshot, ModuleKey, ModuleLoadState};
