//! Stable hashing for group keys.
//!
//! `std`'s `HashMap` hashing is randomized per process; anything whose order
//! must be reproducible (hash-order group ids) goes through blake3.

use blake3::Hasher;

/// Deterministic 64-bit hash of a composite key. Floats hash by bit pattern
/// with `-0.0` folded into `0.0` so equal keys hash equally.
pub fn hash_key(ints: &[i64], flts: &[f64]) -> u64 {
    let mut h = Hasher::new();
    h.update(&(ints.len() as u64).to_le_bytes());
    for i in ints {
        h.update(&i.to_le_bytes());
    }
    for f in flts {
        h.update(&canonical_bits(*f).to_le_bytes());
    }
    let digest = h.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Bit pattern used wherever floats are compared for key equality.
pub fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}
