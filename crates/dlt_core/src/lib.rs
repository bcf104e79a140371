//! Core verification logic for the DMA loopback harness.
//!
//! This crate holds everything that does not touch hardware: the test
//! pattern, byte-for-byte verification of received frames, the lane and
//! channel model, channel pair selection and progress cadence. All modules
//! are `no_std` so the same checks can run next to the driver or in tests.

#![no_std]

#[cfg(test)]
extern crate std;

/// Lane descriptors and transmit/receive channel pair selection.
///
/// Couples the static lane table with runtime buffer sizes and resolves the
/// primary channel pair from the channels the driver reports.
pub mod channel;

/// Deterministic test pattern shared by every lane.
pub mod pattern;

/// Periodic progress reporting.
pub mod progress;

/// Size conversions for command-line overrides.
pub mod units;

/// Byte-for-byte verification of received frames.
///
/// Compares a receive buffer against the expected pattern and classifies
/// the iteration as clean, corrupt or oversized.
pub mod verify;

use core::fmt;

/// Error types returned by lane setup and channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopError {
    /// The driver reported no transmit channels.
    NoTxChannels,

    /// The driver reported no receive channels.
    NoRxChannels,

    /// A requested transmit channel is not among the discovered ones.
    UnknownTxChannel(i32),

    /// A requested receive channel is not among the discovered ones.
    UnknownRxChannel(i32),

    /// A buffer size of zero was requested.
    ZeroLength,

    /// A buffer size above the per-lane limit was requested.
    TooLarge(usize),

    /// A MiB size was negative, not finite, or does not fit in memory.
    InvalidSize,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::NoTxChannels => write!(f, "no transmit channels were found"),
            LoopError::NoRxChannels => write!(f, "no receive channels were found"),
            LoopError::UnknownTxChannel(id) => {
                write!(f, "transmit channel {} is not available", id)
            }
            LoopError::UnknownRxChannel(id) => {
                write!(f, "receive channel {} is not available", id)
            }
            LoopError::ZeroLength => write!(f, "buffer length must be nonzero"),
            LoopError::TooLarge(len) => write!(
                f,
                "buffer length {} exceeds the {} byte limit",
                len,
                dlt_common::buffers::MAX_BUFFER_LEN
            ),
            LoopError::InvalidSize => write!(f, "size is not a valid byte count"),
        }
    }
}

impl core::error::Error for LoopError {}
