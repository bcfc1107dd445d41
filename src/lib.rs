//! Minimal perfect hash tables built with the compress, hash and displace
//! (CHD) algorithm.
//!
//! Given a set of unique keys known up front, [`ChdBuilder`] finds a hash
//! function that maps every key to its own slot in `0..n`, using about one
//! byte of index per key at the default bucket ratio, and much less once the
//! serialized index is compressed. The resulting [`Chd`] table is immutable and
//! serializes to a compact little-endian layout that can be read back by
//! copying ([`Chd::read`]) or aliased in place over a memory-mapped file
//! ([`Chd::mmap`]) without copying keys or values.
//!
//! The [`Indexer`] alone (the key-to-slot function) can be stored and loaded
//! separately for callers who keep keys and values elsewhere.
//!
//! See <http://cmph.sourceforge.net/papers/esa09.pdf> for the algorithm.
//!
//! ```
//! use chd::{Chd, ChdBuilder};
//!
//! # fn main() -> chd::Result<()> {
//! let mut builder = ChdBuilder::default();
//! builder.add("apple", "1");
//! builder.add("banana", "2");
//! let table = builder.build()?;
//!
//! let mut bytes = Vec::new();
//! table.write(&mut bytes)?;
//!
//! let table = Chd::mmap(&bytes)?;
//! assert_eq!(table.get(b"banana"), Some(&b"2"[..]));
//! assert_eq!(table.get(b"cherry"), None);
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{BuildError, DecodeError, EncodeError, Error, Result};

mod hasher;
pub use hasher::{hash, FNV_OFFSET_BASIS, FNV_PRIME};

mod reader;
pub use reader::{Word, WordArray};

mod writer;

mod config;
pub use config::ChdConfig;

mod meta;
pub use meta::ChdInfo;

mod indexer;
pub use indexer::{Indexer, UNASSIGNED};

mod chd;
pub use chd::{Chd, ChdIter};

mod builder;
pub use builder::ChdBuilder;
