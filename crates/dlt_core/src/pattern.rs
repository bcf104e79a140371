//! Deterministic test pattern.
//!
//! Every transmitted frame carries `byte[i] = i mod 256`, so a receiver can
//! check any prefix of a frame without knowing which packet it belongs to.

/// Returns the expected byte at `index`.
#[inline(always)]
pub const fn expected_byte(index: usize) -> u8 {
    (index & 0xFF) as u8
}

/// Fills `buf` with the test pattern starting at index 0.
pub fn fill(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = expected_byte(i);
    }
}
