//! Startup, monitoring and shutdown of the eight lane workers.

use crate::config::{Backend, RunConfig};
use crate::stats::{CounterSnapshot, LaneCounters, ServiceStats};
use crate::worker::{RxWorker, TxWorker};
use anyhow::{Context, Result, anyhow};
use dlt_core::channel::{LaneSpec, select_pair};
use dlt_core::pattern;
use dlt_core::units::bytes_to_mib;
use dlt_hw::DmaEngine;
use dlt_hw::loopback::LoopbackEngine;
use dlt_io::edge::EdgeSource;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity of the supervisor's own sleeps.
const TICK: Duration = Duration::from_millis(50);

/// Final state of one lane.
#[derive(Debug, Clone)]
pub struct LaneReport {
    pub name: &'static str,
    pub counters: CounterSnapshot,
    pub service: ServiceStats,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub lanes: Vec<LaneReport>,
}

impl RunSummary {
    pub fn integrity_failures(&self) -> u64 {
        self.lanes
            .iter()
            .map(|l| l.counters.integrity_failures())
            .sum()
    }
}

/// Runs the configured backend until `running` is cleared or a finite run
/// completes.
pub fn run(config: &RunConfig, running: Arc<AtomicBool>) -> Result<RunSummary> {
    match config.backend {
        Backend::Loopback => {
            info!("Using the software loopback engine");
            let engine = LoopbackEngine::new(config.lanes.len());
            let edges = config
                .lanes
                .iter()
                .map(|lane| engine.edge_line(lane))
                .collect::<Result<Vec<_>, _>>()?;
            run_with(&engine, edges, config, running)
        }
        Backend::Vendor => run_vendor(config, running),
    }
}

#[cfg(feature = "vendor")]
fn run_vendor(config: &RunConfig, running: Arc<AtomicBool>) -> Result<RunSummary> {
    use dlt_common::gpio::PINS;
    use dlt_hw::vendor::VendorEngine;
    use dlt_io::gpio::SysfsGpio;

    let gpio = SysfsGpio::new(&config.sysfs_root);
    let required: Vec<u32> = config.lanes.iter().map(|l| l.irq_pin).collect();
    let mut lines = gpio
        .bring_up(&PINS, &required)
        .with_context(|| format!("GPIO bring-up under {}", gpio.root().display()))?;
    for (pin, line) in lines.iter_mut() {
        match line.level() {
            Ok(level) => log::debug!("gpio{}: initial level {}", pin, u8::from(level)),
            Err(e) => warn!("gpio{}: {}", pin, e),
        }
    }
    let exported: Vec<u32> = lines.keys().copied().collect();
    let edges = required
        .iter()
        .map(|pin| {
            lines
                .remove(pin)
                .ok_or_else(|| anyhow!("gpio{} was not brought up", pin))
        })
        .collect::<Result<Vec<_>>>();

    let result = edges.and_then(|edges| {
        let engine = VendorEngine::open().context("opening the AXI DMA device")?;
        run_with(&engine, edges, config, running)
    });

    drop(lines);
    for pin in exported {
        if let Err(e) = gpio.release(pin) {
            warn!("gpio{}: {}", pin, e);
        }
    }
    result
}

#[cfg(not(feature = "vendor"))]
fn run_vendor(_config: &RunConfig, _running: Arc<AtomicBool>) -> Result<RunSummary> {
    Err(anyhow!(
        "built without hardware support; rebuild with `--features vendor` or pass --loopback"
    ))
}

struct LaneThreads {
    name: &'static str,
    counters: Arc<LaneCounters>,
    tx: JoinHandle<u64>,
    rx: JoinHandle<ServiceStats>,
}

/// Starts the workers of every lane on `engine` and supervises them.
///
/// `edges` holds one interrupt line per lane, in lane order.
pub fn run_with<E, S>(
    engine: &E,
    edges: Vec<S>,
    config: &RunConfig,
    running: Arc<AtomicBool>,
) -> Result<RunSummary>
where
    E: DmaEngine,
    S: EdgeSource + 'static,
{
    if edges.len() != config.lanes.len() {
        return Err(anyhow!(
            "{} interrupt lines for {} lanes",
            edges.len(),
            config.lanes.len()
        ));
    }

    engine.configure().context("configuring the DMA address map")?;

    let tx_chans = engine.tx_channels();
    let rx_chans = engine.rx_channels();
    info!(
        "Discovered transmit channels {:?}, receive channels {:?}",
        tx_chans, rx_chans
    );
    let pair = select_pair(&tx_chans, &rx_chans, config.channels)
        .map_err(|e| anyhow!("channel selection: {}", e))?;
    info!("AXI DMA transfer info:");
    info!("\tTransmit Channel: {}", pair.tx);
    info!("\tReceive Channel: {}", pair.rx);
    info!(
        "\tOutput Data Size: {:.4} MiB",
        bytes_to_mib(config.recv_capacity())
    );

    for lane in &config.lanes {
        if !lane.is_available(&tx_chans, &rx_chans) {
            warn!(
                "lane {}: channels {}/{} were not reported by the driver",
                lane.name, lane.channels.tx, lane.channels.rx
            );
        }
        if lane.send_len > lane.recv_capacity {
            warn!(
                "lane {}: {} byte frames exceed the {} byte receive buffer",
                lane.name, lane.send_len, lane.recv_capacity
            );
        }
    }

    let mut expected = vec![0u8; config.recv_capacity()];
    pattern::fill(&mut expected);
    let expected: Arc<[u8]> = expected.into();

    let mut halves = Vec::with_capacity(config.lanes.len());
    for lane in &config.lanes {
        let pair = engine
            .open_lane(lane)
            .with_context(|| format!("allocating buffers for lane {}", lane.name))?;
        halves.push(pair);
    }
    info!("DMA buffers allocated for {} lanes", halves.len());

    let mut threads = Vec::with_capacity(config.lanes.len());
    for ((lane, (tx, rx)), edge) in config.lanes.iter().zip(halves).zip(edges) {
        threads.push(spawn_lane(
            lane,
            tx,
            rx,
            edge,
            Arc::clone(&expected),
            config,
            &running,
        )?);
    }

    supervise(&threads, config, &running);

    running.store(false, Ordering::Relaxed);
    let mut lanes = Vec::with_capacity(threads.len());
    for t in threads {
        t.tx.join()
            .map_err(|_| anyhow!("lane {}: transmitter panicked", t.name))?;
        let service = t
            .rx
            .join()
            .map_err(|_| anyhow!("lane {}: receiver panicked", t.name))?;
        lanes.push(LaneReport {
            name: t.name,
            counters: t.counters.snapshot(),
            service,
        });
    }

    for lane in &lanes {
        log_final(lane);
    }
    Ok(RunSummary { lanes })
}

fn spawn_lane<T, R, S>(
    lane: &LaneSpec,
    tx: T,
    rx: R,
    edge: S,
    expected: Arc<[u8]>,
    config: &RunConfig,
    running: &Arc<AtomicBool>,
) -> Result<LaneThreads>
where
    T: dlt_hw::DmaTx + 'static,
    R: dlt_hw::DmaRx + 'static,
    S: EdgeSource + 'static,
{
    let counters = Arc::new(LaneCounters::default());

    let receiver = RxWorker::new(
        *lane,
        rx,
        edge,
        expected,
        config.edge_timeout,
        config.stall_after,
        Arc::clone(&counters),
        Arc::clone(running),
    );
    let rx = thread::Builder::new()
        .name(format!("rx-{}", lane.name))
        .spawn(move || receiver.run())
        .with_context(|| format!("spawning receiver of lane {}", lane.name))?;

    let transmitter = TxWorker::new(
        *lane,
        tx,
        config.interval,
        config.packets,
        Arc::clone(&counters),
        Arc::clone(running),
    );
    let tx = thread::Builder::new()
        .name(format!("tx-{}", lane.name))
        .spawn(move || transmitter.run())
        .with_context(|| format!("spawning transmitter of lane {}", lane.name))?;

    Ok(LaneThreads {
        name: lane.name,
        counters,
        tx,
        rx,
    })
}

/// Blocks until the run should end, printing status lines on the way.
///
/// In a finite run, once every transmitter is done, each receiver must sit
/// through one whole edge wait without an interrupt before the run ends.
/// Frames still queued would wake that wait, so a timeout means the lane is
/// empty. The drain gives up after two edge timeouts.
fn supervise(threads: &[LaneThreads], config: &RunConfig, running: &AtomicBool) {
    let start = Instant::now();
    let mut next_status = config.status_interval.map(|i| start + i);
    let mut drain: Option<(Instant, Vec<u64>)> = None;

    while running.load(Ordering::Relaxed) {
        thread::sleep(TICK);
        let now = Instant::now();

        if let Some(at) = next_status {
            if now >= at {
                for t in threads {
                    log_status(start.elapsed(), t.name, &t.counters.snapshot());
                }
                next_status = config.status_interval.map(|i| at + i);
            }
        }

        if config.packets.is_none() {
            continue;
        }
        if drain.is_none() && threads.iter().all(|t| t.tx.is_finished()) {
            info!("All transmitters finished, draining receivers");
            let marks = threads
                .iter()
                .map(|t| t.counters.snapshot().timeouts)
                .collect();
            drain = Some((now + 2 * config.edge_timeout, marks));
        }
        if let Some((deadline, marks)) = &drain {
            let idle = threads
                .iter()
                .zip(marks)
                .all(|(t, &mark)| t.counters.snapshot().timeouts > mark);
            if idle || now >= *deadline {
                if !idle {
                    warn!("Receivers were still busy at the drain deadline");
                }
                for t in threads {
                    let c = t.counters.snapshot();
                    let compared = c.clean + c.dirty + c.skipped;
                    if compared < c.sent {
                        warn!("lane {}: {} of {} frames came back", t.name, compared, c.sent);
                    }
                }
                break;
            }
        }
    }
}

fn log_status(elapsed: Duration, name: &str, c: &CounterSnapshot) {
    info!(
        "T={:4}s | {} | sent {:8} | recv {:8} | clean {:8} | dirty {:5} | skipped {:5} | timeouts {:5}",
        elapsed.as_secs(),
        name,
        c.sent,
        c.received,
        c.clean,
        c.dirty,
        c.skipped,
        c.timeouts
    );
}

fn log_final(lane: &LaneReport) {
    let c = &lane.counters;
    info!(
        "lane {}: sent {} ({} errors), received {} ({} errors), clean {}, dirty {} ({} bytes), skipped {}, timeouts {}, spurious {}",
        lane.name,
        c.sent,
        c.send_errors,
        c.received,
        c.recv_errors,
        c.clean,
        c.dirty,
        c.mismatched_bytes,
        c.skipped,
        c.timeouts,
        c.spurious
    );
    lane.service.log_report(lane.name);
}
