use crate::{DmaEngine, DmaError, DmaRx, DmaTx};
use dlt_core::channel::LaneSpec;
use dlt_io::GpioError;
use dlt_io::edge::{EdgeSource, EdgeWait};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Frames waiting on one lane, plus the edges not yet consumed.
#[derive(Default)]
struct LaneQueue {
    frames: VecDeque<Vec<u8>>,
    edges: u64,
}

#[derive(Default)]
struct LoopLane {
    queue: Mutex<LaneQueue>,
    ready: Condvar,
}

impl LoopLane {
    fn lock(&self) -> MutexGuard<'_, LaneQueue> {
        // A worker panicking mid-push leaves the queue itself consistent.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, frame: Vec<u8>) {
        let mut q = self.lock();
        q.frames.push_back(frame);
        q.edges += 1;
        self.ready.notify_all();
    }
}

/// In-process DMA engine that loops every transmitted frame back.
///
/// Channel ids follow the hardware layout: lane `n` transmits on `2n` and
/// receives on `2n + 1`. Each lane has a software edge line, obtained with
/// [`LoopbackEngine::edge_line`], that fires once per delivered frame.
pub struct LoopbackEngine {
    lanes: Vec<Arc<LoopLane>>,
    tx: Vec<i32>,
    rx: Vec<i32>,
}

impl LoopbackEngine {
    pub fn new(lanes: usize) -> Self {
        let tx = (0..lanes).map(|i| 2 * i as i32).collect();
        let rx = (0..lanes).map(|i| 2 * i as i32 + 1).collect();
        Self::with_channels(lanes, tx, rx)
    }

    /// Builds an engine that reports arbitrary channel lists.
    pub fn with_channels(lanes: usize, tx: Vec<i32>, rx: Vec<i32>) -> Self {
        Self {
            lanes: (0..lanes).map(|_| Arc::new(LoopLane::default())).collect(),
            tx,
            rx,
        }
    }

    fn lane(&self, spec: &LaneSpec) -> Result<&Arc<LoopLane>, DmaError> {
        self.lanes
            .get(spec.index)
            .ok_or(DmaError::NoSuchLane { lane: spec.name })
    }

    /// Returns the software interrupt line of a lane.
    pub fn edge_line(&self, spec: &LaneSpec) -> Result<SoftEdge, DmaError> {
        Ok(SoftEdge {
            pin: spec.irq_pin,
            lane: Arc::clone(self.lane(spec)?),
        })
    }

    /// Queues a frame on a lane's receive side as if the fabric returned it.
    pub fn inject(&self, spec: &LaneSpec, frame: Vec<u8>) -> Result<(), DmaError> {
        self.lane(spec)?.deliver(frame);
        Ok(())
    }

    /// Frames delivered on a lane but not yet drained.
    pub fn pending(&self, spec: &LaneSpec) -> Result<usize, DmaError> {
        Ok(self.lane(spec)?.lock().frames.len())
    }
}

impl DmaEngine for LoopbackEngine {
    type Tx = LoopbackTx;
    type Rx = LoopbackRx;

    fn configure(&self) -> Result<(), DmaError> {
        debug!("loopback engine: nothing to map");
        Ok(())
    }

    fn tx_channels(&self) -> Vec<i32> {
        self.tx.clone()
    }

    fn rx_channels(&self) -> Vec<i32> {
        self.rx.clone()
    }

    fn open_lane(&self, spec: &LaneSpec) -> Result<(LoopbackTx, LoopbackRx), DmaError> {
        let lane = self.lane(spec)?;
        let tx = LoopbackTx {
            name: spec.name,
            send_len: spec.send_len,
            lane: Arc::clone(lane),
        };
        let rx = LoopbackRx {
            name: spec.name,
            capacity: spec.recv_capacity,
            lane: Arc::clone(lane),
        };
        Ok((tx, rx))
    }
}

pub struct LoopbackTx {
    name: &'static str,
    send_len: usize,
    lane: Arc<LoopLane>,
}

impl DmaTx for LoopbackTx {
    fn send(&mut self, frame: &[u8]) -> Result<(), DmaError> {
        if frame.len() != self.send_len {
            return Err(DmaError::FrameLength {
                lane: self.name,
                got: frame.len(),
                want: self.send_len,
            });
        }
        self.lane.deliver(frame.to_vec());
        Ok(())
    }
}

pub struct LoopbackRx {
    name: &'static str,
    capacity: usize,
    lane: Arc<LoopLane>,
}

impl DmaRx for LoopbackRx {
    fn receive(&mut self, out: &mut [u8]) -> Result<usize, DmaError> {
        if out.len() < self.capacity {
            return Err(DmaError::BufferTooSmall {
                lane: self.name,
                got: out.len(),
                want: self.capacity,
            });
        }
        let Some(frame) = self.lane.lock().frames.pop_front() else {
            trace!("lane {}: drained an empty queue", self.name);
            return Ok(0);
        };
        let n = frame.len().min(out.len());
        out[..n].copy_from_slice(&frame[..n]);
        Ok(frame.len())
    }
}

/// Software interrupt line of a loopback lane.
pub struct SoftEdge {
    pin: u32,
    lane: Arc<LoopLane>,
}

impl EdgeSource for SoftEdge {
    fn pin(&self) -> u32 {
        self.pin
    }

    /// Drops edges that have no frame behind them.
    fn arm(&mut self) -> Result<(), GpioError> {
        let mut q = self.lane.lock();
        q.edges = q.frames.len() as u64;
        Ok(())
    }

    fn wait_edge(&mut self, timeout: Option<Duration>) -> Result<EdgeWait, GpioError> {
        let q = self.lane.lock();
        let mut q = match timeout {
            None => self
                .lane
                .ready
                .wait_while(q, |q| q.edges == 0)
                .unwrap_or_else(|e| e.into_inner()),
            Some(t) => {
                self.lane
                    .ready
                    .wait_timeout_while(q, t, |q| q.edges == 0)
                    .unwrap_or_else(|e| e.into_inner())
                    .0
            }
        };
        if q.edges == 0 {
            return Ok(EdgeWait::TimedOut);
        }
        q.edges -= 1;
        Ok(EdgeWait::Edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlt_core::channel::lane_specs;
    use dlt_core::pattern;
    use std::thread;

    fn setup() -> (LoopbackEngine, [LaneSpec; 4]) {
        (LoopbackEngine::new(4), lane_specs(64, 128).unwrap())
    }

    #[test]
    fn reports_hardware_channel_layout() {
        let (engine, _) = setup();
        assert_eq!(engine.tx_channels(), vec![0, 2, 4, 6]);
        assert_eq!(engine.rx_channels(), vec![1, 3, 5, 7]);
        assert!(engine.configure().is_ok());
    }

    #[test]
    fn frame_loops_back_with_edge() {
        let (engine, specs) = setup();
        let (mut tx, mut rx) = engine.open_lane(&specs[2]).unwrap();
        let mut edge = engine.edge_line(&specs[2]).unwrap();
        assert_eq!(edge.pin(), 965);
        edge.arm().unwrap();

        let mut frame = vec![0u8; 64];
        pattern::fill(&mut frame);
        tx.send(&frame).unwrap();

        assert_eq!(
            edge.wait_edge(Some(Duration::from_secs(1))).unwrap(),
            EdgeWait::Edge
        );
        let mut buf = vec![0u8; 128];
        assert_eq!(rx.receive(&mut buf).unwrap(), 64);
        assert_eq!(&buf[..64], &frame[..]);
        assert_eq!(engine.pending(&specs[2]).unwrap(), 0);
    }

    #[test]
    fn lanes_are_independent() {
        let (engine, specs) = setup();
        let (mut tx0, _rx0) = engine.open_lane(&specs[0]).unwrap();
        let mut edge1 = engine.edge_line(&specs[1]).unwrap();
        tx0.send(&[0u8; 64]).unwrap();
        assert_eq!(
            edge1.wait_edge(Some(Duration::from_millis(20))).unwrap(),
            EdgeWait::TimedOut
        );
        assert_eq!(engine.pending(&specs[0]).unwrap(), 1);
    }

    #[test]
    fn oversized_frame_reports_full_length() {
        let (engine, specs) = setup();
        let (_tx, mut rx) = engine.open_lane(&specs[0]).unwrap();
        engine.inject(&specs[0], vec![7u8; 200]).unwrap();
        let mut buf = vec![0u8; 128];
        assert_eq!(rx.receive(&mut buf).unwrap(), 200);
        assert!(buf.iter().all(|&b| b == 7));
    }

    #[test]
    fn wrong_frame_length_is_rejected() {
        let (engine, specs) = setup();
        let (mut tx, _rx) = engine.open_lane(&specs[0]).unwrap();
        assert!(matches!(
            tx.send(&[0u8; 10]),
            Err(DmaError::FrameLength { got: 10, want: 64, .. })
        ));
    }

    #[test]
    fn small_receive_buffer_is_rejected() {
        let (engine, specs) = setup();
        let (_tx, mut rx) = engine.open_lane(&specs[0]).unwrap();
        let mut buf = [0u8; 16];
        assert!(matches!(
            rx.receive(&mut buf),
            Err(DmaError::BufferTooSmall { got: 16, want: 128, .. })
        ));
    }

    #[test]
    fn empty_queue_drains_zero() {
        let (engine, specs) = setup();
        let (_tx, mut rx) = engine.open_lane(&specs[3]).unwrap();
        let mut buf = vec![0u8; 128];
        assert_eq!(rx.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn arm_keeps_edges_backed_by_frames() {
        let (engine, specs) = setup();
        engine.inject(&specs[1], vec![0u8; 4]).unwrap();
        let mut edge = engine.edge_line(&specs[1]).unwrap();
        edge.arm().unwrap();
        assert_eq!(edge.wait_edge(Some(Duration::ZERO)).unwrap(), EdgeWait::Edge);
        assert_eq!(
            edge.wait_edge(Some(Duration::ZERO)).unwrap(),
            EdgeWait::TimedOut
        );
    }

    #[test]
    fn waiter_wakes_on_send_from_other_thread() {
        let (engine, specs) = setup();
        let (mut tx, _rx) = engine.open_lane(&specs[0]).unwrap();
        let mut edge = engine.edge_line(&specs[0]).unwrap();
        let waiter = thread::spawn(move || edge.wait_edge(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(20));
        tx.send(&[1u8; 64]).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), EdgeWait::Edge);
    }

    #[test]
    fn unknown_lane_is_rejected() {
        let engine = LoopbackEngine::new(1);
        let specs = lane_specs(64, 128).unwrap();
        assert!(matches!(
            engine.open_lane(&specs[2]),
            Err(DmaError::NoSuchLane { lane: "dd" })
        ));
    }
}
