/// fern-based dispatcher with rotation of older log files.
pub mod logger;

pub use logger::{cleanup_old_logs, parse_level, setup_logging};
