//! Verification of looped-back frames.
//!
//! The receive side hands over its whole buffer together with the length the
//! driver reported. A length above the buffer capacity means the hardware
//! pipeline misbehaved; such an iteration is never compared. Otherwise every
//! byte up to the reported length is checked against the expected pattern.

use dlt_common::buffers::MISMATCH_SAMPLES;

/// One differing byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mismatch {
    pub index: usize,
    pub expected: u8,
    pub actual: u8,
}

/// Mismatches found in one iteration.
///
/// `count` covers every differing byte; only the first
/// [`MISMATCH_SAMPLES`] are kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchReport {
    pub count: usize,
    samples: [Mismatch; MISMATCH_SAMPLES],
    sampled: usize,
}

impl MismatchReport {
    const fn empty() -> Self {
        Self {
            count: 0,
            samples: [Mismatch {
                index: 0,
                expected: 0,
                actual: 0,
            }; MISMATCH_SAMPLES],
            sampled: 0,
        }
    }

    fn record(&mut self, m: Mismatch) {
        if self.sampled < MISMATCH_SAMPLES {
            self.samples[self.sampled] = m;
            self.sampled += 1;
        }
        self.count += 1;
    }

    /// The first differing bytes, in index order.
    pub fn samples(&self) -> &[Mismatch] {
        &self.samples[..self.sampled]
    }
}

/// Outcome of one receive iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Reported length exceeded the buffer; nothing was compared.
    Oversized { reported: usize, capacity: usize },

    /// All `len` bytes matched.
    Clean { len: usize },

    /// At least one of `len` bytes differed.
    Corrupt { len: usize, report: MismatchReport },
}

/// Checks the first `reported` bytes of `received` against `expected`.
///
/// The capacity is the smaller of the two buffers, so a short expected
/// pattern can never be indexed out of bounds either.
pub fn verify(received: &[u8], reported: usize, expected: &[u8]) -> Verdict {
    let capacity = received.len().min(expected.len());
    if reported > capacity {
        return Verdict::Oversized {
            reported,
            capacity,
        };
    }

    let mut report = MismatchReport::empty();
    for (index, (&actual, &want)) in received[..reported]
        .iter()
        .zip(&expected[..reported])
        .enumerate()
    {
        if actual != want {
            report.record(Mismatch {
                index,
                expected: want,
                actual,
            });
        }
    }

    if report.count == 0 {
        Verdict::Clean { len: reported }
    } else {
        Verdict::Corrupt {
            len: reported,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern;
    use rand::Rng;
    use std::collections::BTreeSet;
    use std::vec;

    fn patterned(len: usize) -> std::vec::Vec<u8> {
        let mut v = vec![0u8; len];
        pattern::fill(&mut v);
        v
    }

    #[test]
    fn clean_frame() {
        let expected = patterned(10240);
        let mut rx = vec![0u8; 10240];
        rx[..8192].copy_from_slice(&expected[..8192]);
        assert_eq!(verify(&rx, 8192, &expected), Verdict::Clean { len: 8192 });
    }

    #[test]
    fn zero_length_is_clean() {
        let expected = patterned(16);
        let rx = [0u8; 16];
        assert_eq!(verify(&rx, 0, &expected), Verdict::Clean { len: 0 });
    }

    #[test]
    fn stale_bytes_past_reported_length_are_ignored() {
        let expected = patterned(64);
        let mut rx = vec![0xEEu8; 64];
        rx[..10].copy_from_slice(&expected[..10]);
        assert_eq!(verify(&rx, 10, &expected), Verdict::Clean { len: 10 });
    }

    #[test]
    fn oversized_is_skipped() {
        let expected = patterned(10240);
        let rx = vec![0u8; 10240];
        assert_eq!(
            verify(&rx, 10241, &expected),
            Verdict::Oversized {
                reported: 10241,
                capacity: 10240
            }
        );
    }

    #[test]
    fn exact_capacity_is_compared() {
        let expected = patterned(512);
        let rx = patterned(512);
        assert_eq!(verify(&rx, 512, &expected), Verdict::Clean { len: 512 });
    }

    #[test]
    fn short_expected_pattern_bounds_capacity() {
        let expected = patterned(100);
        let rx = patterned(200);
        assert!(matches!(
            verify(&rx, 150, &expected),
            Verdict::Oversized { capacity: 100, .. }
        ));
    }

    #[test]
    fn each_differing_byte_counts_once() {
        let expected = patterned(1024);
        let mut rx = patterned(1024);
        rx[3] = 0;
        rx[700] = 0xFF;
        rx[1023] ^= 0x80;
        match verify(&rx, 1024, &expected) {
            Verdict::Corrupt { len, report } => {
                assert_eq!(len, 1024);
                assert_eq!(report.count, 3);
                let idx: std::vec::Vec<usize> = report.samples().iter().map(|m| m.index).collect();
                assert_eq!(idx, [3, 700, 1023]);
                assert_eq!(report.samples()[0].expected, 3);
                assert_eq!(report.samples()[0].actual, 0);
            }
            other => panic!("expected corrupt verdict, got {:?}", other),
        }
    }

    #[test]
    fn samples_are_capped_but_count_is_not() {
        let expected = patterned(256);
        let rx = vec![0xFFu8; 256];
        match verify(&rx, 256, &expected) {
            Verdict::Corrupt { report, .. } => {
                // Only index 255 holds 0xFF in the pattern.
                assert_eq!(report.count, 255);
                assert_eq!(report.samples().len(), MISMATCH_SAMPLES);
            }
            other => panic!("expected corrupt verdict, got {:?}", other),
        }
    }

    #[test]
    fn random_corruption_is_counted_exactly() {
        let mut rng = rand::thread_rng();
        let expected = patterned(8192);
        for _ in 0..50 {
            let mut rx = expected.clone();
            let flips = rng.gen_range(1..64);
            let mut hit = BTreeSet::new();
            for _ in 0..flips {
                let i = rng.gen_range(0..8192);
                let mask: u8 = rng.gen_range(1..=255);
                rx[i] ^= mask;
                hit.insert(i);
            }
            let differing = (0..8192).filter(|&i| rx[i] != expected[i]).count();
            match verify(&rx, 8192, &expected) {
                Verdict::Corrupt { report, .. } => assert_eq!(report.count, differing),
                Verdict::Clean { .. } => assert_eq!(differing, 0),
                Verdict::Oversized { .. } => panic!("unexpected oversized verdict"),
            }
            assert!(differing <= hit.len());
        }
    }
}
