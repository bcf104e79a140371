//! Per-lane statistics for the loopback run.
//!
//! Provides the atomic counters both workers of a lane bump while running,
//! and the service-time histogram a receive worker keeps for the time from
//! edge wake-up to finished verification.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of 10 µs histogram buckets; the last one is open-ended.
const BUCKETS: usize = 20;

/// Tracks service-time statistics with minimal overhead.
///
/// Accumulates measurements and computes min, max, average and a histogram
/// in 10 microsecond buckets. Owned by a single receive worker, so no
/// synchronization is involved.
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub count: u64,
    pub buckets: [u64; BUCKETS],
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    /// Creates an empty tracker; the first measurement becomes the minimum.
    pub fn new() -> Self {
        Self {
            min: u64::MAX,
            max: 0,
            sum: 0,
            count: 0,
            buckets: [0; BUCKETS],
        }
    }

    /// Records a measurement in nanoseconds.
    pub fn update(&mut self, nanos: u64) {
        self.min = self.min.min(nanos);
        self.max = self.max.max(nanos);
        self.sum = self.sum.saturating_add(nanos);
        self.count += 1;

        let idx = (nanos / 10_000).min(BUCKETS as u64 - 1) as usize;
        self.buckets[idx] += 1;
    }

    /// Average service time in nanoseconds, 0.0 when nothing was recorded.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Logs count, min/avg/max and the non-empty histogram buckets.
    pub fn log_report(&self, lane: &str) {
        info!("lane {}: service time over {} iterations", lane, self.count);
        if self.count == 0 {
            return;
        }

        let avg_ns = self.avg();
        if avg_ns < 1000.0 {
            info!(
                "lane {}: min {:.2} ns, avg {:.2} ns, max {:.2} ns",
                lane, self.min as f64, avg_ns, self.max as f64
            );
        } else {
            info!(
                "lane {}: min {:.2} us, avg {:.2} us, max {:.2} us",
                lane,
                self.min as f64 / 1000.0,
                avg_ns / 1000.0,
                self.max as f64 / 1000.0
            );
        }

        for (i, &count) in self.buckets.iter().enumerate() {
            if count > 0 {
                let open = if i == BUCKETS - 1 { ">" } else { "" };
                info!(
                    "lane {}: [{:3}-{:3}{} us]: {}",
                    lane,
                    i * 10,
                    (i + 1) * 10,
                    open,
                    count
                );
            }
        }
    }
}

/// Live counters of one lane, shared by its workers and the supervisor.
#[derive(Debug, Default)]
pub struct LaneCounters {
    pub sent: AtomicU64,
    pub send_errors: AtomicU64,
    pub received: AtomicU64,
    pub clean: AtomicU64,
    pub dirty: AtomicU64,
    pub mismatched_bytes: AtomicU64,
    pub skipped: AtomicU64,
    pub recv_errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub spurious: AtomicU64,
}

impl LaneCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            sent: get(&self.sent),
            send_errors: get(&self.send_errors),
            received: get(&self.received),
            clean: get(&self.clean),
            dirty: get(&self.dirty),
            mismatched_bytes: get(&self.mismatched_bytes),
            skipped: get(&self.skipped),
            recv_errors: get(&self.recv_errors),
            timeouts: get(&self.timeouts),
            spurious: get(&self.spurious),
        }
    }
}

/// Point-in-time copy of [`LaneCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub sent: u64,
    pub send_errors: u64,
    pub received: u64,
    pub clean: u64,
    pub dirty: u64,
    pub mismatched_bytes: u64,
    pub skipped: u64,
    pub recv_errors: u64,
    pub timeouts: u64,
    pub spurious: u64,
}

impl CounterSnapshot {
    /// Iterations that failed verification or could not be compared.
    pub fn integrity_failures(&self) -> u64 {
        self.dirty + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats() {
        let s = ServiceStats::new();
        assert_eq!(s.avg(), 0.0);
        assert_eq!(s.count, 0);
    }

    #[test]
    fn update_tracks_extremes_and_buckets() {
        let mut s = ServiceStats::new();
        s.update(500);
        s.update(15_000);
        s.update(5_000_000);
        assert_eq!(s.min, 500);
        assert_eq!(s.max, 5_000_000);
        assert_eq!(s.count, 3);
        assert_eq!(s.buckets[0], 1);
        assert_eq!(s.buckets[1], 1);
        assert_eq!(s.buckets[BUCKETS - 1], 1);
        assert!((s.avg() - 5_015_500.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn snapshot_reads_counters() {
        let c = LaneCounters::default();
        LaneCounters::bump(&c.sent);
        LaneCounters::bump(&c.sent);
        LaneCounters::bump(&c.dirty);
        LaneCounters::bump(&c.skipped);
        c.mismatched_bytes.fetch_add(7, Ordering::Relaxed);
        let snap = c.snapshot();
        assert_eq!(snap.sent, 2);
        assert_eq!(snap.mismatched_bytes, 7);
        assert_eq!(snap.integrity_failures(), 2);
    }
}
