use std::path::PathBuf;
use std::thread;

use serde::{Deserialize, Serialize};

/// # Registry Options
///
/// Sizes of the two sink worker pools and where the file sink writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryOptions {
    /// Console sink workers. Defaults to 1.
    pub console_workers: usize,
    /// File sink workers. Defaults to the available parallelism minus one.
    pub file_workers: usize,
    /// When `false`, no file sink is created and blocks only reach the console.
    pub file_output: bool,
    /// Directory receiving the `bulk<timestamp>.log` files.
    pub output_dir: PathBuf,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            console_workers: 1,
            file_workers: default_file_workers(),
            file_output: true,
            output_dir: PathBuf::from("."),
        }
    }
}

impl RegistryOptions {
    /// Worker counts floored to one.
    pub fn normalized(mut self) -> Self {
        self.console_workers = self.console_workers.max(1);
        self.file_workers = self.file_workers.max(1);
        self
    }
}

/// Available hardware parallelism minus one, never below one.
pub fn default_file_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
