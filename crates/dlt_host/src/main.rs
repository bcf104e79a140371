//! `axidma-looptest`: AXI DMA loopback validation.
//!
//! Brings up the GPIO interrupt lines of the four DMA lanes, then runs a
//! transmit and a receive worker per lane. Transmitters send a fixed byte
//! pattern at a steady cadence; receivers wake on the lane's interrupt edge,
//! drain the DMA buffer and verify every byte against the same pattern.
//!
//! SIGINT or SIGTERM stops all workers and prints the per-lane summary. The
//! exit status is nonzero when any received frame failed verification.

mod config;
mod stats;
mod supervisor;
mod worker;

use anyhow::{Result, bail};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use config::{Cli, RunConfig};
use log::{info, warn};
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    SimpleLogger::new()
        .with_level(config.log_level)
        .with_threads(true)
        .env()
        .init()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        if flag.swap(false, Ordering::Relaxed) {
            warn!("Interrupted, stopping lanes");
        }
    })?;

    let summary = supervisor::run(&config, running)?;

    let failures = summary.integrity_failures();
    if failures > 0 {
        bail!("{} frames failed verification", failures);
    }
    info!("All lanes verified clean");
    Ok(())
}
