//! # lib_bulk
//!
//! Groups a stream of text commands into bulk blocks and hands every sealed
//! block to a set of thread-pooled sinks (console and per-block log files).
//!
//! Bytes arrive per connection through the boundary functions in [`api`]:
//!
//! ```no_run
//! use lib_bulk::{api, ContextRegistry, RegistryOptions};
//!
//! let registry = ContextRegistry::new(RegistryOptions::default()).unwrap();
//! let handle = api::connect(&registry, 3);
//! api::receive(&registry, handle, b"cmd1\ncmd2\ncmd3\n");
//! api::disconnect(&registry, handle);
//! registry.shutdown();
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Connect/receive/disconnect functions for the transport layer.
pub mod api;
/// Option types shared by the registry and the front ends.
pub mod configs;
/// Engine, context, registry and subscription plumbing.
pub mod core;
/// Library error type.
pub mod error;
/// Diagnostic log setup with file rotation.
#[cfg(feature = "loggers")]
pub mod loggers;
/// Queue-backed sinks and their worker pools.
pub mod sinks;

// Re-export everything the front ends need.
pub use crate::configs::RegistryOptions;
pub use crate::core::block::Block;
pub use crate::core::context::Context;
pub use crate::core::dispatcher::{BlockObserver, Dispatcher};
pub use crate::core::engine::{BulkEngine, EngineState};
pub use crate::core::metrics::{Metrics, ThreadStats};
pub use crate::core::registry::{ContextRegistry, Handle};
pub use crate::error::BulkError;
pub use crate::sinks::{ConsoleSink, FileSink};
