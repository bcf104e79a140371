//! Linux GPIO access for DMA completion interrupts.
//!
//! Provides a typed wrapper over the legacy sysfs GPIO interface and the
//! edge-wait primitive the receive workers block on. These utilities handle
//! the control-file protocol and `poll(2)` plumbing so callers only deal with
//! pins, directions and edges.

/// Interrupt lines that can be waited on for a completion edge.
///
/// Defines the [`edge::EdgeSource`] trait shared by sysfs lines and
/// software-driven lines, and the sysfs implementation that polls a `value`
/// file for `POLLPRI`.
pub mod edge;

/// Sysfs GPIO control: export, direction, edge configuration.
///
/// Writes the sysfs control files for a pin and brings up the set of
/// interrupt inputs the harness listens on.
pub mod gpio;

use std::path::PathBuf;

/// Errors raised while driving sysfs GPIO lines.
#[derive(thiserror::Error, Debug)]
pub enum GpioError {
    #[error("failed to write {value:?} to {path}: {source}")]
    Write {
        path: PathBuf,
        value: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on gpio{pin} value file: {source}")]
    Value {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("poll on gpio{pin} failed: {source}")]
    Poll {
        pin: u32,
        #[source]
        source: nix::Error,
    },
}
