//! # Connection Context
//!
//! One `Context` per live connection: a byte buffer that reassembles lines
//! across arbitrary chunk boundaries, and the engine those lines drive.
//!
//! The per-context lock serializes concurrent `process` calls on the same
//! handle. Different contexts never share a lock, so connections proceed
//! independently.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::block::Block;
use super::dispatcher::BlockObserver;
use super::engine::{BulkEngine, EngineState};
use super::metrics::Metrics;
use super::registry::Handle;

const LINE_TERMINATOR: u8 = b'\n';

struct ContextState {
    buffer: Vec<u8>,
    engine: BulkEngine,
}

/// # Context
///
/// Splits one connection's byte stream into commands and feeds its engine.
/// Dropping a context flushes the engine.
pub struct Context {
    handle: Handle,
    state: Mutex<ContextState>,
    metrics: Option<Arc<Metrics>>,
}

impl Context {
    /// Creates a context whose engine notifies every observer in `observers`.
    pub fn new(
        handle: Handle,
        threshold: usize,
        observers: &[Arc<dyn BlockObserver>],
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let mut engine = BulkEngine::new(threshold);
        for observer in observers {
            engine.subscribe(observer);
        }
        Self {
            handle,
            state: Mutex::new(ContextState {
                buffer: Vec::new(),
                engine,
            }),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The handle this context is registered under.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Bytes received after the last line terminator.
    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Current engine state.
    pub fn engine_state(&self) -> EngineState {
        self.lock().engine.state()
    }

    /// # Process
    ///
    /// Appends `data` and runs every complete line through the engine, in
    /// order. A trailing partial line stays buffered for the next call.
    ///
    /// # Returns
    /// The blocks sealed during this call, in emission order.
    pub fn process(&self, data: &[u8]) -> Vec<Arc<Block>> {
        let mut state = self.lock();
        let ContextState { buffer, engine } = &mut *state;
        buffer.extend_from_slice(data);

        let mut sealed = Vec::new();
        let mut consumed = 0;
        let mut lines = 0u64;
        let mut commands = 0u64;
        while let Some(offset) = buffer[consumed..]
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
        {
            let end = consumed + offset;
            let command = String::from_utf8_lossy(&buffer[consumed..end]);
            if !engine.is_bracket(&command) {
                commands += 1;
            }
            if let Some(block) = engine.process(&command) {
                sealed.push(block);
            }
            consumed = end + 1;
            lines += 1;
        }
        buffer.drain(..consumed);

        if lines > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.add_lines(lines);
                metrics.add_commands(commands);
                metrics.add_blocks(sealed.len() as u64);
            }
        }
        sealed
    }

    /// Flushes the engine now instead of on drop; see [`BulkEngine::flush`].
    pub fn flush(&self) -> Option<Arc<Block>> {
        let block = self.lock().engine.flush();
        self.count_flushed(block.is_some());
        block
    }

    fn count_flushed(&self, emitted: bool) {
        if let (true, Some(metrics)) = (emitted, &self.metrics) {
            metrics.add_blocks(1);
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.buffer.is_empty() {
            log::debug!(
                "Context {} closed with {} bytes of an unterminated line",
                self.handle,
                state.buffer.len()
            );
        }
        let emitted = state.engine.flush().is_some();
        self.count_flushed(emitted);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("handle", &self.handle).finish()
    }
}
