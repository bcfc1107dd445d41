//! The FNV-1a hash shared by the builder and every lookup path.
//!
//! Lookups are only correct when they hash exactly like the build did, so
//! this function is part of the on-disk contract: changing it invalidates
//! every serialized table.

/// 64-bit FNV offset basis.
pub const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;

/// 64-bit FNV prime.
pub const FNV_PRIME: u64 = 1_099_511_628_211;

/// Hashes `data` with 64-bit FNV-1a.
#[inline]
#[must_use]
pub fn hash(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |acc, &byte| {
        (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
