/// Counts events and signals every `every`-th one.
///
/// Both workers log a progress line at a fixed cadence; this keeps the
/// counting and the modulo check in one place.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    count: u64,
    every: u64,
}

impl Progress {
    pub const fn new(every: u64) -> Self {
        Self { count: 0, every }
    }

    /// Records one event; returns true when a report is due.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.every != 0 && self.count % self.every == 0
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
