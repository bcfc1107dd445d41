use serde::{Deserialize, Serialize};

/// Tunable parameters of the displacement search.
///
/// The defaults favour a compact index: two keys per bucket on average, and a
/// search bound that is practically never reached for keys with distinct
/// hashes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChdConfig {
    /// Seed of the generator producing the primary and displacement seeds.
    pub seed: u64,
    /// Buckets per key. Lower values shrink the index and slow the build.
    pub bucket_ratio: f64,
    /// Fresh seeds tried for a single bucket before the search restarts.
    pub max_attempts: u64,
    /// Searches restarted with a new primary seed before the build fails.
    pub max_restarts: u32,
}

impl ChdConfig {
    pub const DEFAULT_BUCKET_RATIO: f64 = 0.5;
    pub const DEFAULT_MAX_ATTEMPTS: u64 = 1 << 20;
    pub const DEFAULT_MAX_RESTARTS: u32 = 64;

    /// Number of primary-hash buckets for `key_count` keys.
    ///
    /// Always odd, so bucket residues stay independent of the low hash bits
    /// that pick a slot when the key count is a power of two, and at least
    /// three for two or more keys, so a new primary seed can split any pair
    /// of keys into different buckets. A ratio that is
    /// not a positive finite number falls back to
    /// [`DEFAULT_BUCKET_RATIO`](Self::DEFAULT_BUCKET_RATIO).
    pub fn bucket_count(&self, key_count: usize) -> usize {
        let ratio = if self.bucket_ratio.is_finite() && self.bucket_ratio > 0.0 {
            self.bucket_ratio
        } else {
            Self::DEFAULT_BUCKET_RATIO
        };
        let minimum = if key_count > 1 { 3 } else { 1 };
        ((key_count as f64 * ratio) as usize).max(minimum) | 1
    }
}

impl Default for ChdConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            bucket_ratio: Self::DEFAULT_BUCKET_RATIO,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            max_restarts: Self::DEFAULT_MAX_RESTARTS,
        }
    }
}
