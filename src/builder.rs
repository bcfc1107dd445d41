use std::collections::HashSet;

use foldhash::fast::RandomState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::BuildError;
use crate::hasher::hash;
use crate::indexer::UNASSIGNED;
use crate::{Chd, ChdConfig, Indexer};

/// Builder collecting key-value pairs for a [`Chd`] table.
///
/// Pairs are accumulated with [`add`](Self::add) (or [`Extend`]) in any
/// order, then [`build`](Self::build) runs the displacement search. Keys must
/// be unique: a repeated key fails the build with
/// [`BuildError::DuplicateKey`] instead of silently replacing the earlier
/// value.
///
/// Builds are deterministic: the same pairs, in the same order, with the same
/// [`ChdConfig`] produce byte-identical tables.
///
/// # Examples
///
/// ```
/// use chd::ChdBuilder;
///
/// let mut builder = ChdBuilder::default().with_seed(7);
/// builder.add("apple", "red");
/// builder.add("banana", "yellow");
/// let table = builder.build().unwrap();
/// assert_eq!(table.get(b"banana"), Some(&b"yellow"[..]));
/// assert_eq!(table.get(b"cherry"), None);
/// ```
#[derive(Debug, Default)]
pub struct ChdBuilder {
    config: ChdConfig,
    keys: Vec<Vec<u8>>,
    values: Vec<Vec<u8>>,
}

impl ChdBuilder {
    /// Replaces the entire construction configuration.
    pub fn with_config(mut self, config: ChdConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the seed of the hash function generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the number of buckets per key.
    ///
    /// A lower ratio produces a smaller index at the cost of a longer search.
    pub fn with_bucket_ratio(mut self, ratio: f64) -> Self {
        self.config.bucket_ratio = ratio;
        self
    }

    /// Bounds the number of fresh seeds tried for a single bucket.
    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Bounds the number of searches restarted with a new primary seed.
    pub fn with_max_restarts(mut self, restarts: u32) -> Self {
        self.config.max_restarts = restarts;
        self
    }

    pub fn config(&self) -> &ChdConfig {
        &self.config
    }

    /// Queues a key-value pair.
    pub fn add(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.keys.push(key.into());
        self.values.push(value.into());
    }

    /// Number of queued pairs.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Consumes the builder and constructs the table.
    ///
    /// An empty builder yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateKey`] for a repeated key,
    /// [`BuildError::HashCollision`] when two keys share a 64-bit hash, and
    /// the last search failure once the restart bound is exhausted.
    pub fn build(mut self) -> crate::Result<Chd<'static>> {
        let n = self.keys.len();
        if n == 0 {
            log::debug!("Building empty CHD table");
            return Ok(Chd::empty());
        }
        if u32::try_from(n).is_err() {
            return Err(BuildError::TooManyKeys(n).into());
        }
        self.check_duplicates()?;

        let bucket_count = self.config.bucket_count(n);
        log::debug!(
            "Building CHD table with {n} keys in {bucket_count} buckets (seed={})",
            self.config.seed
        );

        let hashes: Vec<u64> = self.keys.iter().map(|key| hash(key)).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut restarts = 0;

        let placement = loop {
            let r0: u64 = rng.random();
            match self.search(&hashes, r0, bucket_count, &mut rng) {
                Ok(placement) => break placement,
                Err(e @ BuildError::HashCollision { .. }) => {
                    log::warn!("CHD build failed: {e}");
                    return Err(e.into());
                }
                Err(e) if restarts < self.config.max_restarts => {
                    restarts += 1;
                    log::debug!("Restarting CHD search ({restarts}): {e}");
                }
                Err(e) => {
                    log::warn!("CHD build failed after {restarts} restarts: {e}");
                    return Err(e.into());
                }
            }
        };

        let mut keys = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for entry in placement.slots {
            match entry {
                Some(entry) => {
                    keys.push(std::mem::take(&mut self.keys[entry]));
                    values.push(std::mem::take(&mut self.values[entry]));
                }
                None => {
                    keys.push(Vec::new());
                    values.push(Vec::new());
                }
            }
        }

        log::debug!(
            "Built CHD table with {n} keys, {} hash functions, {restarts} restarts",
            placement.hash_functions.len()
        );

        let indexer = Indexer::from_parts(&placement.hash_functions, &placement.indices);
        Chd::from_owned(indexer, keys, values)
    }

    fn check_duplicates(&self) -> Result<(), BuildError> {
        let mut seen = HashSet::with_capacity_and_hasher(self.keys.len(), RandomState::default());
        for key in &self.keys {
            if !seen.insert(key.as_slice()) {
                return Err(BuildError::DuplicateKey(key.clone()));
            }
        }
        Ok(())
    }

    /// Runs one displacement search under the primary seed `r0`.
    fn search(
        &self,
        hashes: &[u64],
        r0: u64,
        bucket_count: usize,
        rng: &mut StdRng,
    ) -> Result<Placement, BuildError> {
        let n = hashes.len();
        let mut buckets: Vec<Bucket> = (0..bucket_count)
            .map(|index| Bucket {
                index,
                entries: Vec::new(),
            })
            .collect();
        for (entry, &key_hash) in hashes.iter().enumerate() {
            let h = key_hash ^ r0;
            buckets[(h % bucket_count as u64) as usize].entries.push((h, entry));
        }

        // Collisions are fatal whatever the seed, so look for them everywhere
        // before giving up on this seed.
        let mut unseparable = None;
        for bucket in &mut buckets {
            match self.check_separable(bucket, n) {
                Ok(()) => {}
                Err(e @ BuildError::HashCollision { .. }) => return Err(e),
                Err(e) => {
                    unseparable.get_or_insert(e);
                }
            }
        }
        if let Some(e) = unseparable {
            return Err(e);
        }

        // Largest buckets first, while most slots are still free.
        buckets.sort_by_key(|bucket| std::cmp::Reverse(bucket.entries.len()));

        let mut hash_functions = vec![r0];
        let mut indices = vec![UNASSIGNED; bucket_count];
        let mut slots: Vec<Option<usize>> = vec![None; n];
        let mut candidate = Vec::new();

        for bucket in buckets.iter().take_while(|bucket| !bucket.entries.is_empty()) {
            let selector =
                self.place_bucket(bucket, &mut hash_functions, &slots, &mut candidate, rng)?;
            indices[bucket.index] = selector;
            for (&slot, &(_, entry)) in candidate.iter().zip(&bucket.entries) {
                slots[slot] = Some(entry);
            }
        }

        Ok(Placement {
            hash_functions,
            indices,
            slots,
        })
    }

    /// Picks the hash function for `bucket` and returns its selector, leaving
    /// the chosen slots in `candidate`.
    ///
    /// Existing functions are tried first. A fresh seed is appended only when
    /// it places the bucket, so `hash_functions` never outgrows the selector
    /// space.
    fn place_bucket(
        &self,
        bucket: &Bucket,
        hash_functions: &mut Vec<u64>,
        slots: &[Option<usize>],
        candidate: &mut Vec<usize>,
        rng: &mut StdRng,
    ) -> Result<u16, BuildError> {
        if let Some(selector) = hash_functions
            .iter()
            .position(|&r| bucket.try_place(r, slots, candidate))
        {
            return Ok(selector as u16);
        }
        if hash_functions.len() >= usize::from(UNASSIGNED) {
            return Err(BuildError::TooManyHashFunctions);
        }
        let r = self.find_fresh_seed(bucket, slots, candidate, rng)?;
        hash_functions.push(r);
        Ok((hash_functions.len() - 1) as u16)
    }

    fn find_fresh_seed(
        &self,
        bucket: &Bucket,
        slots: &[Option<usize>],
        candidate: &mut Vec<usize>,
        rng: &mut StdRng,
    ) -> Result<u64, BuildError> {
        for attempt in 1..=self.config.max_attempts {
            let r: u64 = rng.random();
            if bucket.try_place(r, slots, candidate) {
                log::trace!(
                    "Placed bucket {} ({} keys) with a fresh seed after {attempt} attempts",
                    bucket.index,
                    bucket.entries.len()
                );
                return Ok(r);
            }
        }

        Err(BuildError::BucketPlacement {
            bucket: bucket.index,
            bucket_size: bucket.entries.len(),
            attempts: self.config.max_attempts,
        })
    }

    /// Rejects buckets holding a pair that maps to one slot under every seed.
    ///
    /// XOR with a seed flips the same bits of both hashes, so a pair whose
    /// hashes agree on every bit that reaches `slot = (h ^ r) % n` never
    /// separates. For a power-of-two `n` those are the low bits; otherwise
    /// only identical hashes qualify.
    fn check_separable(&self, bucket: &mut Bucket, n: usize) -> Result<(), BuildError> {
        if bucket.entries.len() < 2 {
            return Ok(());
        }
        let mask = if n.is_power_of_two() {
            n as u64 - 1
        } else {
            u64::MAX
        };

        bucket.entries.sort_unstable_by_key(|&(h, entry)| (h & mask, h, entry));
        for pair in bucket.entries.windows(2) {
            let [(h1, first), (h2, second)] = [pair[0], pair[1]];
            if h1 == h2 {
                return Err(BuildError::HashCollision {
                    first: self.keys[first].clone(),
                    second: self.keys[second].clone(),
                });
            }
        }
        if bucket
            .entries
            .windows(2)
            .any(|pair| pair[0].0 & mask == pair[1].0 & mask)
        {
            return Err(BuildError::UnseparableBucket {
                bucket: bucket.index,
                bucket_size: bucket.entries.len(),
            });
        }
        Ok(())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> Extend<(K, V)> for ChdBuilder {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

/// Keys sharing one primary-hash residue.
#[derive(Debug)]
struct Bucket {
    index: usize,
    /// `(hash(key) ^ r0, entry)` per key.
    entries: Vec<(u64, usize)>,
}

impl Bucket {
    /// Computes the slots of every key under seed `r` into `candidate`.
    ///
    /// Succeeds when all slots are free and pairwise distinct.
    fn try_place(&self, r: u64, slots: &[Option<usize>], candidate: &mut Vec<usize>) -> bool {
        let n = slots.len() as u64;
        candidate.clear();
        for &(h, _) in &self.entries {
            let slot = ((h ^ r) % n) as usize;
            if slots[slot].is_some() || candidate.contains(&slot) {
                return false;
            }
            candidate.push(slot);
        }
        true
    }
}

/// Outcome of a successful search.
#[derive(Debug)]
struct Placement {
    hash_functions: Vec<u64>,
    indices: Vec<u16>,
    /// Entry index stored in each slot.
    slots: Vec<Option<usize>>,
}
