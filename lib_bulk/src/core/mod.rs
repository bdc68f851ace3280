//! # Core Engine Module
//!
//! This module forms the heart of the bulk pipeline. It aggregates the
//! components that turn raw per-connection bytes into sealed blocks and hand
//! them to the sinks.
//!
//! ## Core Components:
//!
//! - **`block`**: The sealed, immutable unit of output: an ordered, non-empty
//!   run of commands plus the time its first command was accepted.
//!
//! - **`engine`**: The block-assembly state machine. It batches commands by a
//!   fixed count (static mode) or between `{`/`}` brackets (dynamic mode).
//!
//! - **`dispatcher`**: The zero-copy fan-out. It holds non-owning references
//!   to the observers an engine notifies, so subscribing never extends a
//!   sink's lifetime.
//!
//! - **`context`**: One connection's line splitter paired with its engine.
//!
//! - **`registry`**: The process-wide table of live contexts, owner of the two
//!   shared sinks.
//!
//! - **`metrics`**: Per-thread line/command/block counters.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The sealed block model and its rendered line format.
pub mod block;
/// Per-connection byte splitter driving one engine.
pub mod context;
/// Non-owning observer list with zero-copy broadcast.
pub mod dispatcher;
/// The static/dynamic block-assembly state machine.
pub mod engine;
/// Per-thread throughput counters.
pub mod metrics;
/// Registry of live contexts and owner of the shared sinks.
pub mod registry;

// --- Public API Re-exports ---
pub use block::Block;
pub use context::Context;
pub use dispatcher::{BlockObserver, Dispatcher};
pub use engine::{BulkEngine, EngineState};
pub use metrics::{Metrics, ThreadStats};
pub use registry::{ContextRegistry, Handle};
