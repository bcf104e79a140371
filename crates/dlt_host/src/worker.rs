//! Transmit and receive workers of one lane.
//!
//! Every lane runs one [`TxWorker`] and one [`RxWorker`] on their own
//! threads. They share nothing but the lane's counters, the read-only
//! expected pattern and the global `running` flag.

use crate::stats::{LaneCounters, ServiceStats};
use dlt_common::cadence::REPORT_EVERY;
use dlt_core::channel::LaneSpec;
use dlt_core::pattern;
use dlt_core::progress::Progress;
use dlt_core::verify::{Verdict, verify};
use dlt_hw::{DmaRx, DmaTx};
use dlt_io::edge::{EdgeSource, EdgeWait};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Sends the lane's test frame at a fixed cadence.
pub struct TxWorker<T: DmaTx> {
    spec: LaneSpec,
    tx: T,
    frame: Vec<u8>,
    interval: Duration,
    limit: Option<u64>,
    counters: Arc<LaneCounters>,
    running: Arc<AtomicBool>,
}

impl<T: DmaTx> TxWorker<T> {
    pub fn new(
        spec: LaneSpec,
        tx: T,
        interval: Duration,
        limit: Option<u64>,
        counters: Arc<LaneCounters>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let mut frame = vec![0u8; spec.send_len];
        pattern::fill(&mut frame);
        Self {
            spec,
            tx,
            frame,
            interval,
            limit,
            counters,
            running,
        }
    }

    /// Runs until the packet limit is reached or the run is stopped.
    ///
    /// Returns the number of packets sent successfully.
    pub fn run(mut self) -> u64 {
        let name = self.spec.name;
        let mut progress = Progress::new(REPORT_EVERY);
        let mut sent = 0u64;

        while self.running.load(Ordering::Relaxed) {
            if self.limit.is_some_and(|limit| progress.count() >= limit) {
                info!("lane {}: sent {} packets, transmitter done", name, sent);
                break;
            }
            thread::sleep(self.interval);

            let report = progress.tick();
            match self.tx.send(&self.frame) {
                Ok(()) => {
                    sent += 1;
                    LaneCounters::bump(&self.counters.sent);
                }
                Err(e) => {
                    LaneCounters::bump(&self.counters.send_errors);
                    error!("lane {}: {}", name, e);
                }
            }
            if report {
                info!("lane {}: sent {} packets", name, progress.count());
            }
        }
        sent
    }
}

/// Outcome of one pass through the receive state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStep {
    Verified(Verdict),
    TimedOut,
    Spurious,
    Failed,
}

/// Waits for the lane's completion edge, drains and verifies each frame.
pub struct RxWorker<R: DmaRx, S: EdgeSource> {
    spec: LaneSpec,
    rx: R,
    edge: S,
    buf: Vec<u8>,
    expected: Arc<[u8]>,
    timeout: Duration,
    stall_after: u32,
    idle: u32,
    progress: Progress,
    stats: ServiceStats,
    counters: Arc<LaneCounters>,
    running: Arc<AtomicBool>,
}

impl<R: DmaRx, S: EdgeSource> RxWorker<R, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: LaneSpec,
        rx: R,
        edge: S,
        expected: Arc<[u8]>,
        timeout: Duration,
        stall_after: u32,
        counters: Arc<LaneCounters>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            buf: vec![0u8; spec.recv_capacity],
            spec,
            rx,
            edge,
            expected,
            timeout,
            stall_after,
            idle: 0,
            progress: Progress::new(REPORT_EVERY),
            stats: ServiceStats::new(),
            counters,
            running,
        }
    }

    /// Clears any edge latched before the worker started.
    pub fn arm(&mut self) {
        if let Err(e) = self.edge.arm() {
            warn!("lane {}: clearing stale edge failed: {}", self.spec.name, e);
        }
    }

    /// Waits for one edge and services it.
    pub fn step(&mut self) -> RxStep {
        let name = self.spec.name;
        match self.edge.wait_edge(Some(self.timeout)) {
            Ok(EdgeWait::Edge) => {}
            Ok(EdgeWait::TimedOut) => {
                LaneCounters::bump(&self.counters.timeouts);
                self.idle = self.idle.saturating_add(1);
                if self.idle == self.stall_after {
                    warn!(
                        "lane {}: no interrupt on gpio{} for {} consecutive waits",
                        name,
                        self.edge.pin(),
                        self.idle
                    );
                }
                return RxStep::TimedOut;
            }
            Ok(EdgeWait::Spurious) => {
                LaneCounters::bump(&self.counters.spurious);
                debug!("lane {}: poll woke without an edge", name);
                return RxStep::Spurious;
            }
            Err(e) => {
                LaneCounters::bump(&self.counters.recv_errors);
                error!("lane {}: {}", name, e);
                return RxStep::Failed;
            }
        }

        if self.stall_after > 0 && self.idle >= self.stall_after {
            info!("lane {}: interrupts resumed", name);
        }
        self.idle = 0;

        let start = Instant::now();
        let reported = match self.rx.receive(&mut self.buf) {
            Ok(n) => n,
            Err(e) => {
                LaneCounters::bump(&self.counters.recv_errors);
                error!("lane {}: {}", name, e);
                return RxStep::Failed;
            }
        };
        LaneCounters::bump(&self.counters.received);

        let verdict = verify(&self.buf, reported, &self.expected);
        match &verdict {
            Verdict::Oversized { reported, capacity } => {
                LaneCounters::bump(&self.counters.skipped);
                warn!(
                    "lane {}: receive length {:#x} exceeds the {} byte buffer, iteration skipped",
                    name, reported, capacity
                );
                return RxStep::Verified(verdict);
            }
            Verdict::Clean { .. } => {
                LaneCounters::bump(&self.counters.clean);
            }
            Verdict::Corrupt { len, report } => {
                LaneCounters::bump(&self.counters.dirty);
                self.counters
                    .mismatched_bytes
                    .fetch_add(report.count as u64, Ordering::Relaxed);
                warn!(
                    "lane {}: {} mismatched bytes in a {} byte frame",
                    name, report.count, len
                );
                for m in report.samples() {
                    debug!(
                        "lane {}: expected[{}] = {:#04x}, received[{}] = {:#04x}",
                        name, m.index, m.expected, m.index, m.actual
                    );
                }
            }
        }
        self.stats.update(start.elapsed().as_nanos() as u64);

        if self.progress.tick() {
            info!(
                "lane {}: rec_len = {:#x}, count = {}",
                name,
                reported,
                self.progress.count()
            );
        }
        RxStep::Verified(verdict)
    }

    /// Runs until the run is stopped; returns the service-time statistics.
    pub fn run(mut self) -> ServiceStats {
        info!(
            "lane {}: transmit channel {}, receive channel {}, gpio{}",
            self.spec.name,
            self.spec.channels.tx,
            self.spec.channels.rx,
            self.edge.pin()
        );
        self.arm();
        while self.running.load(Ordering::Relaxed) {
            self.step();
        }
        self.stats
    }
}
