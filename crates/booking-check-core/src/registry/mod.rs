//! Subscriber registry.
//!
//! The registry owns the durable set of recipients and the debug toggle.
//! Every operation is atomic on its own; callers must never read the set and
//! write it back across two calls.

mod set;
mod sled_store;

use std::sync::Arc;

use crate::error::Error;

pub use set::SubscriberSet;
pub use sled_store::SledRegistry;

/// Identifier of a delivery destination (a chat or user).
pub type RecipientId = i64;

/// Atomic operations over the subscriber set and the debug flag.
///
/// Implementations may block on disk I/O. Async callers go through
/// [`run_blocking`] instead of calling these methods on a runtime thread.
pub trait Registry: Send + Sync {
    /// Add a subscriber. Returns `true` if it was not already present.
    fn add_subscriber(&self, id: RecipientId) -> Result<bool, Error>;

    /// Remove a subscriber. Removing an unknown id is not an error.
    fn remove_subscriber(&self, id: RecipientId) -> Result<(), Error>;

    /// Current subscribers, in no particular order.
    fn subscribers(&self) -> Result<Vec<RecipientId>, Error>;

    /// Persist the debug flag.
    fn set_debug(&self, enabled: bool) -> Result<(), Error>;

    /// Read the debug flag; `false` when it was never set.
    fn debug_enabled(&self) -> Result<bool, Error>;
}

/// Thread-safe registry handle.
pub type SharedRegistry = Arc<dyn Registry>;

/// Run a registry operation on the blocking thread pool.
pub async fn run_blocking<T, F>(registry: &SharedRegistry, op: F) -> Result<T, Error>
where
    F: FnOnce(&dyn Registry) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let registry = registry.clone();
    tokio::task::spawn_blocking(move || op(registry.as_ref()))
        .await
        .map_err(|e| Error::Task(e.to_string()))?
}
