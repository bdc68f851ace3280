//! # Configuration Modules
//!
//! Option types for the registry and the helpers front ends use to layer a
//! JSON configuration file under their CLI/environment settings.

/// Worker-pool sizes and output locations for the shared sinks.
pub mod config_registry;

/// JSON config file loading.
pub mod config_file;

pub use config_file::load_json_file;
pub use config_registry::{default_file_workers, RegistryOptions};
