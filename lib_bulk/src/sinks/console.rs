//! Console rendering.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::block::Block;
use crate::core::metrics::Metrics;
use crate::error::BulkError;

use super::pool::{BlockRenderer, QueuedSink};

/// Writes `bulk: ...` lines to one shared stream.
///
/// The stream lock is held for a single line only, so lines from different
/// workers never interleave mid-line.
pub struct ConsoleWriter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleWriter {
    /// Renders to any writer, e.g. an in-memory buffer in tests.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Renders to the process stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl BlockRenderer for ConsoleWriter {
    fn kind(&self) -> &'static str {
        "log"
    }

    fn thread_name(&self, index: usize) -> String {
        match index {
            0 => "log".to_string(),
            n => format!("log{}", n + 1),
        }
    }

    fn render(&self, block: &Block) -> Result<(), BulkError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        block.write_line(&mut *out)?;
        out.flush()?;
        Ok(())
    }
}

impl QueuedSink<ConsoleWriter> {
    /// Console sink on an arbitrary writer with `worker_count` workers.
    pub fn to_writer(
        out: Box<dyn Write + Send>,
        metrics: Arc<Metrics>,
        worker_count: usize,
    ) -> Result<Self, BulkError> {
        Self::spawn(ConsoleWriter::new(out), metrics, worker_count)
    }
}

/// A cloneable in-memory writer, handy for capturing console output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
