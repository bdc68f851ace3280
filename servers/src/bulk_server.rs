//! # Bulk Server
//!
//! Reads commands from stdin and groups them into bulk blocks.
//!
//! Stdin plays the transport: raw chunks are handed to the library through
//! `connect`/`receive`/`disconnect` exactly as a network front end would.
//! Blocks go to stdout and to `bulk<timestamp>.log` files; diagnostics go to
//! stderr and a rotated log file. On exit the per-thread statistics are
//! printed.

mod bulk_logic;

use anyhow::{bail, Result};
use bulk_logic::config::{load_config, Config};
use clap::Parser;
use lib_bulk::loggers::setup_logging;
use lib_bulk::{api, ContextRegistry};
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Config::parse())?;
    let bulk_size = config.bulk_size()?;

    let log_path = setup_logging("bulk_server", &config.log_dir(), config.log_level(), 1)?;
    log::info!("Logging to {}", log_path.display());

    let registry = ContextRegistry::new(config.registry_options())?;
    registry.metrics().register_front_end("main");

    let handle = api::connect(&registry, bulk_size);
    if handle.is_null() {
        bail!("Failed to open a context for stdin");
    }
    log::info!("Reading stdin as context {} with bulk size {}", handle, bulk_size);

    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; config.read_chunk()];
    loop {
        tokio::select! {
            read = stdin.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => api::receive(&registry, handle, &buf[..n]),
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, flushing pending commands.");
                break;
            }
        }
    }

    api::disconnect(&registry, handle);
    registry.shutdown();

    print!("{}", registry.metrics());
    Ok(())
}
