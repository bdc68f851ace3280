//! # Zero-Copy Block Dispatcher
//!
//! The `Dispatcher` is the subscription list an engine notifies whenever it
//! seals a block. It takes one sealed block and hands it to every subscribed
//! observer with as little work as possible on the caller's thread.
//!
//! ## Core Design Principles:
//!
//! 1.  **Zero-Copy Fan-out**: The block is wrapped in an `Arc` once. Each
//!     observer receives a clone of that pointer, never a copy of the
//!     commands.
//!
//! 2.  **Non-Owning Subscriptions**: Observers are stored as `Weak`
//!     references. The registry owns the sinks; an engine subscribing to them
//!     never keeps a sink alive. An observer that has been dropped is pruned
//!     on the next broadcast, the same way a disconnected client is pruned.
//!
//! 3.  **Non-Blocking Notify**: `BlockObserver::update` must only enqueue.
//!     Rendering happens on the observer's own worker threads, so a broadcast
//!     never waits on console or disk I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::{Arc, Weak};

use super::block::Block;

/// # Block Observer
///
/// Anything that wants to receive sealed blocks. Implementations must be
/// cheap and non-blocking: append to a queue, signal, return.
pub trait BlockObserver: Send + Sync {
    /// Receives one sealed block.
    fn update(&self, block: Arc<Block>);
}

/// # Core Dispatcher
///
/// Holds the observers of one engine. Not synchronized on its own: it lives
/// inside the engine, which is already guarded by its context's lock.
#[derive(Default)]
pub struct Dispatcher {
    observers: Vec<Weak<dyn BlockObserver>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// # Subscribe
    ///
    /// Registers `observer` without taking ownership of it.
    ///
    /// # Returns
    /// `false` if the same observer instance was already registered, in which
    /// case nothing changes.
    pub fn subscribe(&mut self, observer: &Arc<dyn BlockObserver>) -> bool {
        let weak = Arc::downgrade(observer);
        if self.observers.iter().any(|o| same_observer(o, &weak)) {
            return false;
        }
        self.observers.push(weak);
        true
    }

    /// Removes `observer` if present. Neither side is destroyed.
    pub fn unsubscribe(&mut self, observer: &Arc<dyn BlockObserver>) -> bool {
        let weak = Arc::downgrade(observer);
        let before = self.observers.len();
        self.observers.retain(|o| !same_observer(o, &weak));
        before != self.observers.len()
    }

    /// Number of registered observers that are still alive.
    pub fn len(&self) -> usize {
        self.observers.iter().filter(|o| o.strong_count() > 0).count()
    }

    /// `true` when no live observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Broadcast
    ///
    /// Hands `block` to every live observer, in subscription order, and drops
    /// the references of observers that no longer exist.
    ///
    /// # Returns
    /// The number of observers that received the block.
    pub fn broadcast(&mut self, block: &Arc<Block>) -> usize {
        let mut delivered = 0;
        self.observers.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                observer.update(Arc::clone(block));
                delivered += 1;
                true
            }
            None => {
                log::debug!("Observer dropped. Removing it from dispatcher.");
                false
            }
        });
        delivered
    }
}

/// Identity by allocation address; vtable pointers are ignored.
fn same_observer(a: &Weak<dyn BlockObserver>, b: &Weak<dyn BlockObserver>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}
