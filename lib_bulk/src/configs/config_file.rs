use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::BulkError;

/// Reads and parses a JSON config file.
///
/// # Returns
/// `Ok(None)` when the file does not exist, so callers can fall back to
/// other sources; read and parse failures are errors.
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, BulkError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}
