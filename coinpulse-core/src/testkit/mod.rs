//! In-memory fakes for tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests). Fakes are scriptable: failure counters make the
//! next N operations fail so retry and partial-success paths can be driven
//! without real sockets, clocks or databases.

mod bus;
mod provider;
mod store;

pub use bus::{MemoryBus, MemoryTransport};
pub use provider::{FailingProvider, StaticProvider};
pub use store::MemoryPriceStore;

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Consume one scripted failure if any remain.
pub(crate) fn take_scripted_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
