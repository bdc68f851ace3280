//! # Transport Boundary
//!
//! The three calls a transport layer makes per connection. They never return
//! errors and never unwind into the caller: internal failures and panics are
//! logged and turned into a null handle (for `connect`) or a silent no-op.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::core::registry::{ContextRegistry, Handle};

/// Runs `f`, converting a panic into `None` after logging `what`.
fn guarded<T>(what: &str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            log::error!("Panic while trying to {}", what);
            None
        }
    }
}

/// Opens a connection whose static blocks hold `bulk` commands.
///
/// Returns [`Handle::NULL`] if the context could not be created.
pub fn connect(registry: &ContextRegistry, bulk: usize) -> Handle {
    match guarded("create context", || registry.create(bulk)) {
        Some(Ok(handle)) => handle,
        Some(Err(e)) => {
            log::error!("Failed to create new context: {}", e);
            Handle::NULL
        }
        None => Handle::NULL,
    }
}

/// Feeds raw bytes to the connection behind `handle`.
///
/// Unknown or null handles are ignored.
pub fn receive(registry: &ContextRegistry, handle: Handle, data: &[u8]) {
    guarded("receive data", || {
        if let Some(context) = registry.find(handle) {
            context.process(data);
        }
    });
}

/// Closes the connection behind `handle`, flushing its pending static block.
///
/// Unknown or null handles are ignored.
pub fn disconnect(registry: &ContextRegistry, handle: Handle) {
    guarded("erase context", || {
        registry.erase(handle);
    });
}
