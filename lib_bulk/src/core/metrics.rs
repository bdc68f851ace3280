//! # Per-Thread Throughput Metrics
//!
//! A small accountant recording, for every thread that touches the pipeline,
//! how many input lines it split and how many commands and blocks it handled:
//! batched on a front-end thread, rendered on a sink worker.
//!
//! ## Core Functionality:
//!
//! - **Atomic Counting**: Each thread owns a `ThreadCounters` entry made of
//!   `AtomicU64`s. The map lock is taken only to find (or create) the entry;
//!   the increments themselves are lock-free with `Ordering::Relaxed`, since
//!   only the eventual totals matter.
//!
//! - **Explicit Sharing**: A `Metrics` is created by the registry and handed
//!   to sinks and contexts by `Arc`. There is no process-global instance, so
//!   tests can run isolated pipelines side by side.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct ThreadCounters {
    name: Mutex<Option<String>>,
    front_end: AtomicBool,
    lines: AtomicU64,
    commands: AtomicU64,
    blocks: AtomicU64,
    /// Registration order, so reports are stable.
    order: u64,
}

/// # Thread Statistics
///
/// A point-in-time copy of one thread's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStats {
    /// Registered name, or `thread-<n>` for threads that never registered.
    pub name: String,
    /// Input lines split on this thread.
    pub lines: u64,
    /// Commands batched or rendered on this thread.
    pub commands: u64,
    /// Blocks sealed or rendered on this thread.
    pub blocks: u64,
    /// Whether the thread reads input. Decides the report format.
    pub front_end: bool,
}

impl fmt::Display for ThreadStats {
    /// Front-end threads report lines; sink workers only report output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.front_end {
            write!(
                f,
                "{} thread - {} lines, {} commands, {} blocks",
                self.name, self.lines, self.commands, self.blocks
            )
        } else {
            write!(
                f,
                "{} thread - {} commands, {} blocks",
                self.name, self.commands, self.blocks
            )
        }
    }
}

/// # Metrics
///
/// Shared, thread-safe per-thread counters.
#[derive(Debug, Default)]
pub struct Metrics {
    threads: Mutex<HashMap<ThreadId, Arc<ThreadCounters>>>,
}

impl Metrics {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> Arc<ThreadCounters> {
        let id = thread::current().id();
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let next_order = threads.len() as u64;
        Arc::clone(threads.entry(id).or_insert_with(|| {
            Arc::new(ThreadCounters {
                order: next_order,
                ..ThreadCounters::default()
            })
        }))
    }

    /// Names the calling thread in reports.
    pub fn register_thread(&self, name: &str) {
        let counters = self.counters();
        let mut slot = counters.name.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(name.to_string());
    }

    /// Names the calling thread and marks it as a front end, so it reports
    /// lines even before any input arrives.
    pub fn register_front_end(&self, name: &str) {
        self.register_thread(name);
        self.counters().front_end.store(true, Ordering::Relaxed);
    }

    /// Counts `n` input lines on the calling thread, marking it a front end.
    pub fn add_lines(&self, n: u64) {
        let counters = self.counters();
        counters.front_end.store(true, Ordering::Relaxed);
        counters.lines.fetch_add(n, Ordering::Relaxed);
    }

    /// Counts `n` commands on the calling thread.
    pub fn add_commands(&self, n: u64) {
        self.counters().commands.fetch_add(n, Ordering::Relaxed);
    }

    /// Counts `n` blocks on the calling thread.
    pub fn add_blocks(&self, n: u64) {
        self.counters().blocks.fetch_add(n, Ordering::Relaxed);
    }

    /// Copies every thread's counters, in registration order.
    pub fn snapshot(&self) -> Vec<ThreadStats> {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<&Arc<ThreadCounters>> = threads.values().collect();
        entries.sort_by_key(|c| c.order);
        entries
            .into_iter()
            .map(|c| ThreadStats {
                name: c
                    .name
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
                    .unwrap_or_else(|| format!("thread-{}", c.order)),
                lines: c.lines.load(Ordering::Relaxed),
                commands: c.commands.load(Ordering::Relaxed),
                blocks: c.blocks.load(Ordering::Relaxed),
                front_end: c.front_end.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Sums the counters of every thread whose name starts with `prefix`.
    pub fn totals(&self, prefix: &str) -> ThreadStats {
        self.snapshot()
            .into_iter()
            .filter(|s| s.name.starts_with(prefix))
            .fold(
                ThreadStats {
                    name: prefix.to_string(),
                    lines: 0,
                    commands: 0,
                    blocks: 0,
                    front_end: false,
                },
                |mut acc, s| {
                    acc.front_end |= s.front_end;
                    acc.lines += s.lines;
                    acc.commands += s.commands;
                    acc.blocks += s.blocks;
                    acc
                },
            )
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stats in self.snapshot() {
            writeln!(f, "{}", stats)?;
        }
        Ok(())
    }
}
