use serde::Serialize;

/// Summary returned by [`Chd::info`](crate::Chd::info).
#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct ChdInfo {
    /// Number of entries in the table.
    pub entry_count: u64,
    /// Number of primary-hash buckets.
    pub bucket_count: u64,
    /// Number of buckets without a selector.
    pub empty_buckets: u64,
    /// Length of the hash function table, primary seed included.
    pub hash_function_count: u64,
    /// Largest selector in use, if any bucket is assigned.
    pub max_selector: Option<u16>,
    /// Size in bytes of the serialized indexer.
    pub indexer_length: u64,
    /// Size in bytes of the serialized table, indexer included.
    pub table_length: u64,
    /// Serialized indexer size per entry, in bits.
    pub bits_per_key: f64,
}
