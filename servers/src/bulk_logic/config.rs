use anyhow::{bail, Result};
use clap::Parser;
use lib_bulk::configs::{default_file_workers, load_json_file};
use lib_bulk::RegistryOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Accepts a positive integer without leading zeros.
pub fn parse_bulk_size(value: &str) -> Result<usize, String> {
    let valid = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && !value.starts_with('0');
    if !valid {
        return Err(format!("'{}' is not a positive integer", value));
    }
    value.parse().map_err(|e| format!("'{}': {}", value, e))
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Groups stdin commands into bulk blocks written to the console and log files", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(value_parser = parse_bulk_size, help = "Number of commands in a static block.")]
    pub bulk_size: Option<usize>,

    #[clap(long, env = "BULK_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "BULK_CONSOLE_WORKERS", help = "Worker threads of the console sink.")]
    pub console_workers: Option<usize>,

    #[clap(long, env = "BULK_FILE_WORKERS", help = "Worker threads of the file sink.")]
    pub file_workers: Option<usize>,

    #[clap(long, env = "BULK_OUTPUT_DIR", help = "Directory for bulk<timestamp>.log files.")]
    pub output_dir: Option<PathBuf>,

    #[clap(
        long,
        env = "BULK_NO_FILE_OUTPUT",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Only write blocks to the console."
    )]
    pub no_file_output: Option<bool>,

    #[clap(long, env = "BULK_LOG_DIR", help = "Directory for diagnostic log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "BULK_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, off).")]
    pub log_level: Option<String>,

    #[clap(long, env = "BULK_READ_CHUNK", help = "Bytes read from stdin per receive call.")]
    pub read_chunk: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    pub fn merge(self, other: Config) -> Config {
        Config {
            bulk_size: other.bulk_size.or(self.bulk_size),
            config_path: other.config_path.or(self.config_path),
            console_workers: other.console_workers.or(self.console_workers),
            file_workers: other.file_workers.or(self.file_workers),
            output_dir: other.output_dir.or(self.output_dir),
            no_file_output: other.no_file_output.or(self.no_file_output),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            read_chunk: other.read_chunk.or(self.read_chunk),
        }
    }

    pub fn defaults() -> Config {
        Config {
            console_workers: Some(1),
            file_workers: Some(default_file_workers()),
            output_dir: Some(PathBuf::from(".")),
            no_file_output: Some(false),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            read_chunk: Some(4096),
            ..Default::default()
        }
    }

    pub fn bulk_size(&self) -> Result<usize> {
        match self.bulk_size {
            Some(size) if size > 0 => Ok(size),
            _ => bail!("The bulk size must be given as the only positional argument, e.g. `bulk_server 3`"),
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        let fallback = RegistryOptions::default();
        RegistryOptions {
            console_workers: self.console_workers.unwrap_or(fallback.console_workers),
            file_workers: self.file_workers.unwrap_or(fallback.file_workers),
            file_output: !self.no_file_output.unwrap_or(false),
            output_dir: self.output_dir.clone().unwrap_or(fallback.output_dir),
        }
        .normalized()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn read_chunk(&self) -> usize {
        self.read_chunk.unwrap_or(4096).max(1)
    }
}

/// Layers defaults < config file < environment/CLI.
pub fn load_config(cli: Config) -> Result<Config> {
    let mut current_config = Config::defaults();

    // Allow overriding default config file path with CLI arg.
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("bulk_server.conf"));

    // The logger is not installed yet, so report on stderr.
    match load_json_file::<Config>(&config_file_path) {
        Ok(Some(file_config)) => current_config = current_config.merge(file_config),
        Ok(None) => {}
        Err(e) => eprintln!(
            "Failed to load config file {}: {}. Falling back to other sources.",
            config_file_path.display(),
            e
        ),
    }

    // clap already folded environment variables into the CLI values.
    Ok(current_config.merge(cli))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn bulk_size_rules() {
        assert_eq!(parse_bulk_size("16"), Ok(16));
        assert_eq!(parse_bulk_size("1"), Ok(1));
        assert!(parse_bulk_size("0").is_err());
        assert!(parse_bulk_size("01").is_err());
        assert!(parse_bulk_size("a").is_err());
        assert!(parse_bulk_size("").is_err());
        assert!(parse_bulk_size("-3").is_err());
    }

    #[test]
    fn cli_parsing() {
        let cli = Config::try_parse_from(["bulk_server", "3", "--no-file-output", "--console-workers", "2"]).unwrap();
        assert_eq!(cli.bulk_size, Some(3));
        assert_eq!(cli.no_file_output, Some(true));
        assert_eq!(cli.console_workers, Some(2));
        assert!(Config::try_parse_from(["bulk_server", "03"]).is_err());
    }

    #[test]
    fn merge_prefers_other() {
        let base = Config {
            bulk_size: Some(1),
            log_level: Some("info".to_string()),
            ..Default::default()
        };
        let over = Config {
            bulk_size: Some(5),
            ..Default::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.bulk_size, Some(5));
        assert_eq!(merged.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn file_layer_sits_between_defaults_and_cli() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulk_server.conf");
        fs::write(&path, r#"{"bulkSize": 7, "fileWorkers": 3, "logLevel": "debug"}"#).unwrap();

        let cli = Config {
            config_path: Some(path),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let config = load_config(cli).unwrap();
        assert_eq!(config.bulk_size().unwrap(), 7);
        assert_eq!(config.file_workers, Some(3));
        assert_eq!(config.log_level(), "warn");
        assert_eq!(config.console_workers, Some(1));
    }

    #[test]
    fn missing_bulk_size_is_an_error() {
        assert!(Config::defaults().bulk_size().is_err());
    }

    #[test]
    fn registry_options_follow_config() {
        let config = Config {
            file_workers: Some(0),
            no_file_output: Some(true),
            ..Config::defaults()
        };
        let options = config.registry_options();
        assert_eq!(options.file_workers, 1);
        assert!(!options.file_output);
    }
}
