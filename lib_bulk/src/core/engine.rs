//! # Bulk Engine
//!
//! The block-assembly state machine. One engine lives inside each context and
//! consumes that connection's commands one at a time.
//!
//! ## States:
//!
//! - **Static**: commands accumulate until `threshold` of them are pending,
//!   then the run is sealed as a block.
//! - **Dynamic**: entered on `{`. Commands accumulate until the matching `}`
//!   brings the nesting depth back to zero. The threshold does not apply and
//!   the brackets themselves never appear in a block.
//!
//! `flush` seals a pending static run but discards an unterminated dynamic
//! one: an open bracket without its close never produces output.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::Arc;

use chrono::Utc;

use super::block::Block;
use super::dispatcher::{BlockObserver, Dispatcher};

/// Command that opens a dynamic block.
pub const OPEN_BRACKET: &str = "{";
/// Command that closes a dynamic block.
pub const CLOSE_BRACKET: &str = "}";

/// Observable state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accumulating toward the fixed threshold.
    Static,
    /// Inside an explicit bracket, with the current nesting depth (always >= 1).
    Dynamic {
        /// Number of `{` not yet matched by a `}`.
        depth: usize,
    },
}

/// Commands collected so far, plus the time the first of them was accepted.
#[derive(Debug, Default)]
struct Pending {
    started_at: Option<i64>,
    commands: Vec<String>,
}

impl Pending {
    fn push(&mut self, command: &str) {
        if self.commands.is_empty() {
            self.started_at = Some(Utc::now().timestamp());
        }
        self.commands.push(command.to_string());
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn seal(&mut self) -> Option<Block> {
        if self.commands.is_empty() {
            return None;
        }
        let started_at = self.started_at.take().unwrap_or_else(|| Utc::now().timestamp());
        Some(Block::new(started_at, std::mem::take(&mut self.commands)))
    }

    fn discard(&mut self) -> usize {
        let dropped = self.commands.len();
        self.commands.clear();
        self.started_at = None;
        dropped
    }
}

/// # Bulk Engine
///
/// Turns a command stream into sealed blocks and notifies its observers.
pub struct BulkEngine {
    threshold: usize,
    state: EngineState,
    pending: Pending,
    dispatcher: Dispatcher,
}

impl BulkEngine {
    /// Creates an engine in `Static` state.
    ///
    /// A `threshold` of zero is raised to one so that every command makes
    /// progress.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            state: EngineState::Static,
            pending: Pending::default(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// The effective static block size.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Number of commands waiting to be sealed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Subscribes an observer; see [`Dispatcher::subscribe`].
    pub fn subscribe(&mut self, observer: &Arc<dyn BlockObserver>) -> bool {
        self.dispatcher.subscribe(observer)
    }

    /// Unsubscribes an observer; see [`Dispatcher::unsubscribe`].
    pub fn unsubscribe(&mut self, observer: &Arc<dyn BlockObserver>) -> bool {
        self.dispatcher.unsubscribe(observer)
    }

    /// `true` if `command` would be taken as a bracket in the current state
    /// rather than batched. A `}` is a bracket only inside a dynamic block.
    pub fn is_bracket(&self, command: &str) -> bool {
        match self.state {
            EngineState::Static => command == OPEN_BRACKET,
            EngineState::Dynamic { .. } => command == OPEN_BRACKET || command == CLOSE_BRACKET,
        }
    }

    /// # Process
    ///
    /// Feeds one command through the state machine.
    ///
    /// # Returns
    /// The block sealed by this command, if any. It has already been handed to
    /// every observer by the time it is returned.
    pub fn process(&mut self, command: &str) -> Option<Arc<Block>> {
        match (self.state, command) {
            (EngineState::Static, OPEN_BRACKET) => {
                let sealed = self.pending.seal();
                self.state = EngineState::Dynamic { depth: 1 };
                sealed.map(|block| self.emit(block))
            }
            (EngineState::Dynamic { depth }, OPEN_BRACKET) => {
                self.state = EngineState::Dynamic { depth: depth + 1 };
                None
            }
            (EngineState::Dynamic { depth }, CLOSE_BRACKET) => {
                if depth > 1 {
                    self.state = EngineState::Dynamic { depth: depth - 1 };
                    return None;
                }
                self.state = EngineState::Static;
                self.pending.seal().map(|block| self.emit(block))
            }
            (EngineState::Dynamic { .. }, _) => {
                self.pending.push(command);
                None
            }
            // A bare `}` in static mode has nothing to close and counts as a command.
            (EngineState::Static, _) => {
                self.pending.push(command);
                if self.pending.len() >= self.threshold {
                    self.pending.seal().map(|block| self.emit(block))
                } else {
                    None
                }
            }
        }
    }

    /// # Flush
    ///
    /// Ends the stream: a pending static run is sealed and emitted, a pending
    /// dynamic run is discarded. The engine is back in `Static` afterwards.
    pub fn flush(&mut self) -> Option<Arc<Block>> {
        match self.state {
            EngineState::Static => self.pending.seal().map(|block| self.emit(block)),
            EngineState::Dynamic { depth } => {
                let dropped = self.pending.discard();
                self.state = EngineState::Static;
                if dropped > 0 {
                    log::debug!(
                        "Discarded {} commands of an unterminated block (depth {})",
                        dropped,
                        depth
                    );
                }
                None
            }
        }
    }

    fn emit(&mut self, block: Block) -> Arc<Block> {
        debug_assert!(!block.is_empty());
        let block = Arc::new(block);
        self.dispatcher.broadcast(&block);
        block
    }
}

impl std::fmt::Debug for BulkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkEngine")
            .field("threshold", &self.threshold)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("observers", &self.dispatcher.len())
            .finish()
    }
}
