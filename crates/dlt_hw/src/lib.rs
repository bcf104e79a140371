//! DMA transfer façade for the loopback harness.
//!
//! The AXI-DMA engine, descriptor handling and DMA-capable memory live in the
//! vendor driver library. This crate narrows that library down to what the
//! harness needs: channel discovery, one-time address-map configuration, and
//! per-lane send/receive halves that each worker thread owns exclusively.
//!
//! Two engines implement the façade: [`loopback::LoopbackEngine`], a
//! software echo used for dry runs and tests, and `vendor::VendorEngine`,
//! which binds the vendor library through a small C shim when the `vendor`
//! feature is enabled.

use dlt_core::channel::LaneSpec;

/// Software engine that echoes every frame back to its lane.
///
/// Raises a software edge per delivered frame so receive workers run the
/// same wait/drain/verify cycle they run against real hardware.
pub mod loopback;

/// Bindings to the vendor AXI-DMA library.
///
/// Only built with the `vendor` feature; the build script then compiles the
/// C shim against the vendor headers and links the library.
#[cfg(feature = "vendor")]
pub mod vendor;

/// Errors reported by the DMA façade.
#[derive(thiserror::Error, Debug)]
pub enum DmaError {
    #[error("failed to initialize the AXI DMA device")]
    Init,
    #[error("failed to allocate DMA buffers for lane {lane}")]
    Alloc { lane: &'static str },
    #[error("lane {lane}: {op} failed with status {code}")]
    Transfer {
        lane: &'static str,
        op: &'static str,
        code: i32,
    },
    #[error("lane {lane}: frame of {got} bytes does not match the {want} byte send length")]
    FrameLength {
        lane: &'static str,
        got: usize,
        want: usize,
    },
    #[error("lane {lane}: receive buffer of {got} bytes is below the {want} byte capacity")]
    BufferTooSmall {
        lane: &'static str,
        got: usize,
        want: usize,
    },
    #[error("lane {lane} is not provided by this engine")]
    NoSuchLane { lane: &'static str },
}

/// Transmit half of a lane.
pub trait DmaTx: Send {
    /// Sends one frame and blocks until the driver has queued it.
    fn send(&mut self, frame: &[u8]) -> Result<(), DmaError>;
}

/// Receive half of a lane.
pub trait DmaRx: Send {
    /// Drains the lane's receive buffer into `out`.
    ///
    /// Returns the length the driver reported. That length may exceed
    /// `out.len()`, in which case `out` holds only a prefix and the caller
    /// must discard the iteration.
    fn receive(&mut self, out: &mut [u8]) -> Result<usize, DmaError>;
}

/// A DMA device that can open transmit/receive lanes.
pub trait DmaEngine: Send + Sync {
    type Tx: DmaTx + 'static;
    type Rx: DmaRx + 'static;

    /// Sets up the address map and enables the read/write engines.
    fn configure(&self) -> Result<(), DmaError>;

    /// Transmit channel ids reported by the driver.
    fn tx_channels(&self) -> Vec<i32>;

    /// Receive channel ids reported by the driver.
    fn rx_channels(&self) -> Vec<i32>;

    /// Allocates the lane's DMA buffers and returns its two halves.
    fn open_lane(&self, lane: &LaneSpec) -> Result<(Self::Tx, Self::Rx), DmaError>;
}
