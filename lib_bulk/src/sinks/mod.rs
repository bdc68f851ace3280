//! # Sinks
//!
//! Asynchronous consumers of sealed blocks. Each sink owns an unbounded FIFO
//! queue, a condition variable and a pool of long-lived worker threads. The
//! engine side only enqueues; workers pop one block at a time and render it.
//!
//! - **`pool`**: the generic queue + worker pool, [`QueuedSink`].
//! - **`console`**: renders `bulk: ...` lines to a shared writer (stdout).
//! - **`file`**: renders each block into its own `bulk<timestamp>.log` file.

/// Console renderer.
pub mod console;
/// Per-block file renderer.
pub mod file;
/// Generic queue-backed worker pool.
pub mod pool;

pub use console::{ConsoleWriter, SharedBuffer};
pub use file::FileWriter;
pub use pool::{BlockRenderer, QueuedSink};

/// Sink writing blocks to the console.
pub type ConsoleSink = QueuedSink<ConsoleWriter>;
/// Sink writing each block to its own log file.
pub type FileSink = QueuedSink<FileWriter>;
