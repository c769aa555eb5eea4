//! CRC32 checksums for marker log records
//!
//! The checksum covers the length prefix, record type, sequence number and
//! payload. Any mismatch is corruption.

use crc32fast::Hasher;

/// Computes a CRC32 (IEEE) checksum over `data`.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
