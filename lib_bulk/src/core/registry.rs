//! # Context Registry
//!
//! The process-wide table of live contexts, keyed by opaque [`Handle`]s, and
//! the owner of the two sinks every context's engine reports to.
//!
//! ## Lifetime and ordering:
//!
//! - Construct the registry before the first `create` and share it by
//!   reference (or `Arc`) with the transport layer.
//! - `erase` removes a context under the registry lock but drops it outside
//!   of it. If another thread is still inside `process` on that context (it
//!   holds an `Arc` from `find`), the flush happens when that call returns.
//! - `shutdown` (also run on drop) closes whatever contexts are left, then
//!   stops the console sink and the file sink, draining their queues.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::context::Context;
use super::dispatcher::BlockObserver;
use super::metrics::Metrics;
use crate::configs::RegistryOptions;
use crate::error::BulkError;
use crate::sinks::{ConsoleSink, ConsoleWriter, FileSink, FileWriter};

/// # Handle
///
/// Opaque identity of a live context. Handles are never reused within one
/// registry, and [`Handle::NULL`] is never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// The failure sentinel returned by [`crate::api::connect`].
    pub const NULL: Handle = Handle(0);

    /// Wraps a raw value, e.g. one round-tripped through a transport layer.
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    /// The raw value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// `true` for the failure sentinel.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// # Context Registry
///
/// Serializes create/find/erase with a single lock.
pub struct ContextRegistry {
    contexts: Mutex<HashMap<Handle, Arc<Context>>>,
    next_handle: AtomicU64,
    console: Arc<ConsoleSink>,
    file: Option<Arc<FileSink>>,
    metrics: Arc<Metrics>,
    stopped: AtomicBool,
}

impl ContextRegistry {
    /// Creates a registry writing to stdout and, unless disabled, to files in
    /// `options.output_dir`.
    pub fn new(options: RegistryOptions) -> Result<Self, BulkError> {
        Self::with_console(options, ConsoleWriter::stdout())
    }

    /// Like [`ContextRegistry::new`] but rendering console output through
    /// `console`.
    pub fn with_console(options: RegistryOptions, console: ConsoleWriter) -> Result<Self, BulkError> {
        let options = options.normalized();
        let metrics = Arc::new(Metrics::new());

        let console = Arc::new(ConsoleSink::spawn(
            console,
            Arc::clone(&metrics),
            options.console_workers,
        )?);
        let file = if options.file_output {
            Some(Arc::new(FileSink::spawn(
                FileWriter::new(&options.output_dir),
                Arc::clone(&metrics),
                options.file_workers,
            )?))
        } else {
            None
        };

        log::info!(
            "Context registry ready: {} console workers, {} file workers",
            console.worker_count(),
            file.as_ref().map_or(0, |f| f.worker_count())
        );

        Ok(Self {
            contexts: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            console,
            file,
            metrics,
            stopped: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Handle, Arc<Context>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> Vec<Arc<dyn BlockObserver>> {
        let console: Arc<dyn BlockObserver> = self.console.clone();
        let mut observers = vec![console];
        if let Some(file) = &self.file {
            observers.push(file.clone() as Arc<dyn BlockObserver>);
        }
        observers
    }

    /// # Create
    ///
    /// Builds a context with a fresh engine subscribed to the shared sinks.
    ///
    /// # Returns
    /// A handle unique among live contexts, never [`Handle::NULL`].
    pub fn create(&self, threshold: usize) -> Result<Handle, BulkError> {
        let handle = Handle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let context = Arc::new(Context::new(
            handle,
            threshold,
            &self.observers(),
            Some(Arc::clone(&self.metrics)),
        ));

        let mut contexts = self.lock();
        // Checked under the lock so shutdown's drain cannot miss this insert.
        if self.stopped.load(Ordering::Acquire) {
            drop(contexts);
            return Err(BulkError::SinkStopped {
                sink: "registry".to_string(),
            });
        }
        contexts.insert(handle, context);
        drop(contexts);
        log::debug!("Context {} created (bulk {})", handle, threshold.max(1));
        Ok(handle)
    }

    /// Looks up a live context.
    pub fn find(&self, handle: Handle) -> Option<Arc<Context>> {
        if handle.is_null() {
            return None;
        }
        self.lock().get(&handle).cloned()
    }

    /// # Erase
    ///
    /// Removes the context and flushes it. Unknown handles are ignored.
    ///
    /// # Returns
    /// `true` if a context was removed.
    pub fn erase(&self, handle: Handle) -> bool {
        let removed = self.lock().remove(&handle);
        match removed {
            Some(context) => {
                // Dropped here, outside the registry lock.
                drop(context);
                log::debug!("Context {} erased", handle);
                true
            }
            None => false,
        }
    }

    /// Number of live contexts.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Throughput counters shared by the contexts and sinks.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// The shared console sink.
    pub fn console(&self) -> &Arc<ConsoleSink> {
        &self.console
    }

    /// The shared file sink, absent in console-only mode.
    pub fn file(&self) -> Option<&Arc<FileSink>> {
        self.file.as_ref()
    }

    /// # Shutdown
    ///
    /// Closes remaining contexts, then drains and joins both sinks. Runs once;
    /// later calls return immediately.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let leftovers: Vec<Arc<Context>> = self.lock().drain().map(|(_, c)| c).collect();
        if !leftovers.is_empty() {
            log::warn!("Closing {} contexts still open at shutdown", leftovers.len());
        }
        drop(leftovers);

        self.console.stop();
        if let Some(file) = &self.file {
            file.stop();
        }
        log::info!("Context registry shut down");
    }
}

impl Drop for ContextRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
