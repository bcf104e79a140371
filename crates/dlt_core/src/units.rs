use crate::LoopError;

/// Bytes per mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Converts a size in MiB to whole bytes, rounding down.
pub fn mib_to_bytes(mib: f64) -> Result<usize, LoopError> {
    if !mib.is_finite() || mib < 0.0 {
        return Err(LoopError::InvalidSize);
    }
    let bytes = mib * MIB;
    if bytes >= usize::MAX as f64 {
        return Err(LoopError::InvalidSize);
    }
    Ok(bytes as usize)
}

/// Converts a byte count to MiB for display.
pub fn bytes_to_mib(bytes: usize) -> f64 {
    bytes as f64 / MIB
}
