//! Stable string hashing used to derive reproducible per-image parameters.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;
const BUCKETS: u32 = 10_000;

/// Maps `key` onto `[0, 1)` with a 32-bit FNV-1a hash folded into a fixed
/// number of buckets.
///
/// The hash walks UTF-16 code units so ids hash identically to the values
/// produced by browser-side tooling that stored them.
#[must_use]
pub fn hash_to_unit(key: &str) -> f32 {
    let mut h = FNV_OFFSET_BASIS;
    for unit in key.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(FNV_PRIME);
    }
    (h % BUCKETS) as f32 / BUCKETS as f32
}
