use std::io::{Read, Write};

use crate::hasher::hash;
use crate::reader::{SliceReader, WordArray};
use crate::writer::write_words;

/// Wire value of a bucket selector that names no hash function.
pub const UNASSIGNED: u16 = u16::MAX;

/// The two-level CHD hash: a primary seed that picks a bucket and a
/// per-bucket selector into the table of displacement seeds.
///
/// An `Indexer` only maps keys to slots; it does not know which keys were in
/// the build set. Any key maps to *some* slot, so callers must compare the
/// key stored at that slot (see [`Chd::get`](crate::Chd::get)).
///
/// # Layout
///
/// ```text
/// u32 r_len | u64[r_len] | u32 indices_len | u16[indices_len]
/// ```
///
/// All integers are little-endian with no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Indexer<'a> {
    /// Hash function seeds; `r[0]` is the primary seed.
    r: WordArray<'a, u64>,
    /// Per-bucket index into `r`, or [`UNASSIGNED`].
    indices: WordArray<'a, u16>,
}

impl Indexer<'static> {
    /// Indexer of an empty table.
    pub fn empty() -> Self {
        Self::from_parts(&[], &[])
    }

    /// Creates an owned indexer from raw seed and selector tables.
    pub fn from_parts(r: &[u64], indices: &[u16]) -> Self {
        Self {
            r: WordArray::from_words(r),
            indices: WordArray::from_words(indices),
        }
    }

    /// Reads a serialized indexer, copying the whole stream into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the data is truncated.
    pub fn read<R: Read>(mut reader: R) -> crate::Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Indexer::mmap(&data)?.into_owned())
    }
}

impl<'a> Indexer<'a> {
    /// Creates an indexer aliasing the serialized form in `data`.
    ///
    /// Nothing is copied: lookups decode seeds and selectors straight from
    /// `data`, which must outlive the indexer and stay unchanged. Bytes past
    /// the end of the indexer are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is shorter than its length prefixes claim.
    pub fn mmap(data: &'a [u8]) -> crate::Result<Self> {
        Self::mmap_from(&mut SliceReader::new(data))
    }

    pub(crate) fn mmap_from(reader: &mut SliceReader<'a>) -> crate::Result<Self> {
        let r_len = reader.read_u32("hash function count")? as usize;
        let r = reader.read_words(r_len, "hash functions")?;

        let indices_len = reader.read_u32("bucket count")? as usize;
        let indices = reader.read_words(indices_len, "bucket selectors")?;

        Ok(Self { r, indices })
    }

    /// Maps `key` to a slot in `0..num_keys`.
    ///
    /// Keys from the build set map to distinct slots. A key that lands in an
    /// unassigned bucket gets slot `0`; so does every key when the indexer or
    /// `num_keys` is empty.
    #[must_use]
    pub fn get(&self, key: &[u8], num_keys: usize) -> u64 {
        let Some(r0) = self.r.get(0) else {
            return 0;
        };
        if self.indices.is_empty() || num_keys == 0 {
            return 0;
        }

        let h = hash(key) ^ r0;
        let bucket = (h % self.indices.len() as u64) as usize;
        match self.selector(bucket).and_then(|ri| self.r.get(usize::from(ri))) {
            Some(r) => (h ^ r) % num_keys as u64,
            None => 0,
        }
    }

    /// Selector of `bucket`, or `None` for an unassigned bucket.
    ///
    /// Selectors that do not name an existing hash function are treated as
    /// unassigned.
    #[must_use]
    pub fn selector(&self, bucket: usize) -> Option<u16> {
        self.indices
            .get(bucket)
            .filter(|&ri| ri != UNASSIGNED && usize::from(ri) < self.r.len())
    }

    /// Hash function seeds, `r[0]` first.
    pub fn hash_functions(&self) -> &WordArray<'a, u64> {
        &self.r
    }

    /// Raw per-bucket selectors, including [`UNASSIGNED`] entries.
    pub fn indices(&self) -> &WordArray<'a, u16> {
        &self.indices
    }

    /// Number of primary-hash buckets.
    pub fn bucket_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of buckets without a selector.
    pub fn empty_bucket_count(&self) -> usize {
        (0..self.indices.len())
            .filter(|&bucket| self.selector(bucket).is_none())
            .count()
    }

    /// Largest selector in use.
    pub fn max_selector(&self) -> Option<u16> {
        (0..self.indices.len())
            .filter_map(|bucket| self.selector(bucket))
            .max()
    }

    /// Exact number of bytes [`write`](Self::write) produces.
    pub fn serialized_len(&self) -> usize {
        4 + self.r.as_bytes().len() + 4 + self.indices.as_bytes().len()
    }

    /// Serializes the indexer. The output can be passed to [`mmap`](Self::mmap).
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn write<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        write_words(writer, &self.r, "hash functions")?;
        write_words(writer, &self.indices, "bucket selectors")?;
        Ok(())
    }

    /// Whether the indexer aliases a caller-owned buffer.
    pub fn is_borrowed(&self) -> bool {
        self.r.is_borrowed() || self.indices.is_borrowed()
    }

    /// Detaches the indexer from any borrowed buffer.
    pub fn into_owned(self) -> Indexer<'static> {
        Indexer {
            r: self.r.into_owned(),
            indices: self.indices.into_owned(),
        }
    }
}

impl std::fmt::Debug for Indexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("hash_functions", &self.r.len())
            .field("buckets", &self.indices.len())
            .finish()
    }
}
