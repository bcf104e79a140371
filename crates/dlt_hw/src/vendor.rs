//! Vendor AXI-DMA engine.
//!
//! Binds the flat entry points of `src/shim/axidma_shim.c`, which in turn
//! call the vendor library. The device handle and the per-lane transfer
//! structs are opaque pointers owned by the shim.

use crate::{DmaEngine, DmaError, DmaRx, DmaTx};
use dlt_core::channel::LaneSpec;
use log::{debug, info};
use std::ffi::{c_int, c_long, c_uchar, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

/// Upper bound on the channel ids read back from the driver.
const MAX_CHANNELS: usize = 32;

unsafe extern "C" {
    /// Opens the AXI DMA device. Returns null on failure.
    fn dlt_dev_init() -> *mut c_void;

    /// Releases the device and every resource the driver still holds.
    fn dlt_dev_destroy(dev: *mut c_void);

    /// Maps the DMA register space and enables the read/write engines.
    fn dlt_dev_config();

    /// Copies up to `cap` transmit channel ids into `out`.
    ///
    /// Returns the total number of channels, which may exceed `cap`.
    fn dlt_dev_tx_channels(dev: *mut c_void, out: *mut c_int, cap: c_int) -> c_int;

    /// Copies up to `cap` receive channel ids into `out`.
    fn dlt_dev_rx_channels(dev: *mut c_void, out: *mut c_int, cap: c_int) -> c_int;

    /// Allocates a transfer struct and its DMA buffers. Returns null on
    /// allocation failure, with nothing left allocated.
    fn dlt_lane_open(
        dev: *mut c_void,
        tx_channel: c_int,
        rx_channel: c_int,
        send_len: usize,
        recv_len: usize,
    ) -> *mut c_void;

    /// Frees the DMA buffers and the transfer struct.
    fn dlt_lane_close(dev: *mut c_void, lane: *mut c_void);

    /// Sends `send_len` bytes from `frame` on lane `index`.
    fn dlt_lane_send(dev: *mut c_void, index: c_int, lane: *mut c_void, frame: *const c_uchar)
    -> c_int;

    /// Drains lane `index` into `out` and returns the reported length, or a
    /// negative value for an unknown lane.
    fn dlt_lane_read(dev: *mut c_void, index: c_int, lane: *mut c_void, out: *mut c_uchar)
    -> c_long;
}

struct Device {
    raw: NonNull<c_void>,
}

// The vendor library serializes access to its device state internally; the
// handle itself is never mutated from Rust.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { dlt_dev_destroy(self.raw.as_ptr()) };
        debug!("AXI DMA device destroyed");
    }
}

/// The AXI DMA device as exposed by the vendor library.
pub struct VendorEngine {
    dev: Arc<Device>,
}

impl VendorEngine {
    /// Opens the AXI DMA device.
    pub fn open() -> Result<Self, DmaError> {
        let raw = NonNull::new(unsafe { dlt_dev_init() }).ok_or(DmaError::Init)?;
        info!("Succeeded to initialize the AXI DMA device");
        Ok(Self {
            dev: Arc::new(Device { raw }),
        })
    }

    fn channels(
        &self,
        fetch: unsafe extern "C" fn(*mut c_void, *mut c_int, c_int) -> c_int,
    ) -> Vec<i32> {
        let mut ids = [0 as c_int; MAX_CHANNELS];
        let total = unsafe { fetch(self.dev.raw.as_ptr(), ids.as_mut_ptr(), MAX_CHANNELS as c_int) };
        let n = (total.max(0) as usize).min(MAX_CHANNELS);
        ids[..n].to_vec()
    }
}

impl DmaEngine for VendorEngine {
    type Tx = VendorTx;
    type Rx = VendorRx;

    fn configure(&self) -> Result<(), DmaError> {
        unsafe { dlt_dev_config() };
        Ok(())
    }

    fn tx_channels(&self) -> Vec<i32> {
        self.channels(dlt_dev_tx_channels)
    }

    fn rx_channels(&self) -> Vec<i32> {
        self.channels(dlt_dev_rx_channels)
    }

    fn open_lane(&self, spec: &LaneSpec) -> Result<(VendorTx, VendorRx), DmaError> {
        let raw = unsafe {
            dlt_lane_open(
                self.dev.raw.as_ptr(),
                spec.channels.tx,
                spec.channels.rx,
                spec.send_len,
                spec.recv_capacity,
            )
        };
        let raw = NonNull::new(raw).ok_or(DmaError::Alloc { lane: spec.name })?;
        let lane = Arc::new(Lane {
            dev: Arc::clone(&self.dev),
            raw,
            index: spec.index as c_int,
            name: spec.name,
        });
        debug!(
            "lane {}: allocated {} byte send and {} byte receive buffers",
            spec.name, spec.send_len, spec.recv_capacity
        );
        Ok((
            VendorTx {
                lane: Arc::clone(&lane),
                send_len: spec.send_len,
            },
            VendorRx {
                lane,
                capacity: spec.recv_capacity,
            },
        ))
    }
}

/// Transfer struct shared by the two halves of a lane.
struct Lane {
    dev: Arc<Device>,
    raw: NonNull<c_void>,
    index: c_int,
    name: &'static str,
}

// The transmit and receive halves touch disjoint buffers of the transfer
// struct; the driver keeps the two directions apart.
unsafe impl Send for Lane {}
unsafe impl Sync for Lane {}

impl Drop for Lane {
    fn drop(&mut self) {
        unsafe { dlt_lane_close(self.dev.raw.as_ptr(), self.raw.as_ptr()) };
    }
}

pub struct VendorTx {
    lane: Arc<Lane>,
    send_len: usize,
}

impl DmaTx for VendorTx {
    fn send(&mut self, frame: &[u8]) -> Result<(), DmaError> {
        if frame.len() != self.send_len {
            return Err(DmaError::FrameLength {
                lane: self.lane.name,
                got: frame.len(),
                want: self.send_len,
            });
        }
        let lane = &self.lane;
        let code = unsafe {
            dlt_lane_send(
                lane.dev.raw.as_ptr(),
                lane.index,
                lane.raw.as_ptr(),
                frame.as_ptr(),
            )
        };
        if code != 0 {
            return Err(DmaError::Transfer {
                lane: lane.name,
                op: "send",
                code,
            });
        }
        Ok(())
    }
}

pub struct VendorRx {
    lane: Arc<Lane>,
    capacity: usize,
}

impl DmaRx for VendorRx {
    fn receive(&mut self, out: &mut [u8]) -> Result<usize, DmaError> {
        // The driver copies out of a buffer of `capacity` bytes, so `out`
        // must be at least that large.
        if out.len() < self.capacity {
            return Err(DmaError::BufferTooSmall {
                lane: self.lane.name,
                got: out.len(),
                want: self.capacity,
            });
        }
        let lane = &self.lane;
        let n = unsafe {
            dlt_lane_read(
                lane.dev.raw.as_ptr(),
                lane.index,
                lane.raw.as_ptr(),
                out.as_mut_ptr(),
            )
        };
        if n < 0 {
            return Err(DmaError::Transfer {
                lane: lane.name,
                op: "read",
                code: n as i32,
            });
        }
        Ok(n as usize)
    }
}
