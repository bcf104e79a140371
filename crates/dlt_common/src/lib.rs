//! Common definitions and constants shared across the DMA loopback harness.
//!
//! This crate provides the GPIO sysfs layout, the fixed interrupt pin
//! assignment, buffer geometry and worker cadence used by the core logic,
//! the sysfs GPIO layer, the DMA façade and the host binary.

#![no_std]

// Linux sysfs GPIO layout used for completion interrupts.
//
// The PL fabric raises one GPIO line per DMA lane when a receive transfer
// has landed in host memory. Lines are driven through the legacy sysfs
// interface, which exposes export/unexport control files at the root and
// one directory per exported pin.
pub mod gpio {
    /// Default mount point of the sysfs GPIO class.
    pub const SYSFS_ROOT: &str = "/sys/class/gpio";

    /// First GPIO number wired to the DMA completion interrupts.
    ///
    /// The AXI GPIO block sits at the top of the GPIO number space on the
    /// target board, so its eight inputs are numbered from this base.
    pub const PIN_BASE: u32 = 960;

    /// Number of GPIO inputs wired from the PL fabric.
    pub const PIN_COUNT: u32 = 8;

    /// All GPIO numbers brought up at startup.
    pub const PINS: [u32; PIN_COUNT as usize] = {
        let mut pins = [0; PIN_COUNT as usize];
        let mut i = 0;
        while i < pins.len() {
            pins[i] = PIN_BASE + i as u32;
            i += 1;
        }
        pins
    };

    /// Number of bytes read from a `value` file to acknowledge an edge.
    pub const ACK_READ_LEN: usize = 10;
}

// Buffer geometry for transmit and receive transfers.
pub mod buffers {
    /// Default capacity of each lane's receive buffer in bytes.
    ///
    /// A reported receive length above this value is treated as a hardware
    /// fault and the iteration is discarded.
    pub const RECV_CAPACITY: usize = 10240;

    /// Default length of each transmitted test frame in bytes.
    pub const SEND_LEN: usize = 8192;

    /// Largest send or receive buffer a lane may request, in bytes.
    ///
    /// DMA buffers come out of the contiguous memory pool of the driver,
    /// which is far smaller than this on the target board.
    pub const MAX_BUFFER_LEN: usize = 64 * 1024 * 1024;

    /// Number of mismatching bytes recorded per iteration for diagnostics.
    pub const MISMATCH_SAMPLES: usize = 8;
}

// Worker timing and reporting cadence.
pub mod cadence {
    /// Default pause between two transmissions on one lane, in microseconds.
    pub const SEND_INTERVAL_US: u64 = 4000;

    /// Progress is logged once every this many packets or iterations.
    pub const REPORT_EVERY: u64 = 1000;

    /// Default bound on a single edge wait, in milliseconds.
    pub const EDGE_TIMEOUT_MS: u64 = 1000;

    /// Consecutive edge timeouts after which a lane is reported as stalled.
    pub const STALL_AFTER: u32 = 10;

    /// Default interval between supervisor status lines, in seconds.
    pub const STATUS_INTERVAL_S: u64 = 1;
}

/// Static description of one DMA lane.
///
/// A lane couples a transmit channel, a receive channel and the GPIO pin the
/// PL fabric pulses when the receive side completes. The `name` matches the
/// suffix of the vendor driver's per-lane primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLayout {
    pub name: &'static str,
    pub tx_channel: i32,
    pub rx_channel: i32,
    pub irq_pin: u32,
}

/// Number of lanes exercised by the harness.
pub const LANE_COUNT: usize = 4;

/// Fixed lane table of the target bitstream.
///
/// Each lane listens on the odd pin of its GPIO pair; the even pins are
/// brought up with the rest but nothing waits on them.
pub const LANES: [LaneLayout; LANE_COUNT] = [
    LaneLayout {
        name: "jm",
        tx_channel: 0,
        rx_channel: 1,
        irq_pin: gpio::PIN_BASE + 1,
    },
    LaneLayout {
        name: "dx",
        tx_channel: 2,
        rx_channel: 3,
        irq_pin: gpio::PIN_BASE + 3,
    },
    LaneLayout {
        name: "dd",
        tx_channel: 4,
        rx_channel: 5,
        irq_pin: gpio::PIN_BASE + 5,
    },
    LaneLayout {
        name: "dj",
        tx_channel: 6,
        rx_channel: 7,
        irq_pin: gpio::PIN_BASE + 7,
    },
];
