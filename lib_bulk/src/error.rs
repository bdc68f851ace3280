use thiserror::Error;

/// Errors raised inside the batching pipeline.
///
/// None of these cross the boundary in [`crate::api`]; they are logged there
/// and turned into a null handle or a silent no-op.
#[derive(Debug, Error)]
pub enum BulkError {
    /// An I/O error occurred, typically while rendering a block to a file.
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// The OS refused to start a sink worker thread.
    #[error("Failed to spawn worker thread {name}: {source}")]
    WorkerSpawn {
        /// Name the thread would have carried.
        name: String,
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The sink was already stopped when work was submitted to it.
    #[error("Sink {sink} is stopped")]
    SinkStopped {
        /// Kind of the stopped sink (`log` or `file`).
        sink: String,
    },

    /// A configuration file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A global logger was already installed.
    #[error("Logger setup failed: {0}")]
    Log(#[from] log::SetLoggerError),
}
