//! CRC-32 accumulation.
//!
//! The image stores two CRC-32 values (IEEE polynomial) and a native-method checksum that is
//! built by folding many small strings into one running value. [`crc32`] therefore takes the
//! previous result as a seed: `crc32(b, crc32(a, 0)) == crc32(a ++ b, 0)`.

use crc32fast::Hasher;

/// Computes the CRC-32 of `data`, continuing from `seed` (use `0` to start fresh).
#[must_use]
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    let mut hasher = Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}
