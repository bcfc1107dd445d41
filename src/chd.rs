use std::borrow::Cow;
use std::io::{Read, Write};

use crate::error::BuildError;
use crate::reader::SliceReader;
use crate::writer::write_len;
use crate::{ChdInfo, Indexer};

/// Immutable minimal perfect hash table.
///
/// Every key of the build set owns exactly one slot in `0..len()`; the slot
/// holds the key itself next to its value so that lookups of foreign keys,
/// which also hash to *some* slot, can be rejected.
///
/// A table is either owned (built, or copied by [`read`](Self::read)) or
/// borrowed from a serialized buffer by [`mmap`](Self::mmap). A borrowed
/// table aliases the buffer for its whole lifetime; the buffer must not
/// change meanwhile.
///
/// # Layout
///
/// ```text
/// <indexer> | u32 n | { u32 key_len, u32 value_len, key, value } * n
/// ```
///
/// See [`Indexer`] for the indexer block. Integers are little-endian and
/// there is no padding, version tag or checksum.
///
/// # Examples
///
/// ```
/// use chd::{Chd, ChdBuilder};
///
/// # fn main() -> chd::Result<()> {
/// let mut builder = ChdBuilder::default();
/// builder.add("it", "1");
/// builder.add("works", "2");
/// let table = builder.build()?;
///
/// let mut bytes = Vec::new();
/// table.write(&mut bytes)?;
///
/// let aliased = Chd::mmap(&bytes)?;
/// assert_eq!(aliased.get(b"works"), Some(&b"2"[..]));
/// assert_eq!(aliased.get(b"nope"), None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Chd<'a> {
    indexer: Indexer<'a>,
    keys: Vec<Cow<'a, [u8]>>,
    values: Vec<Cow<'a, [u8]>>,
}

impl Chd<'static> {
    /// Table without entries.
    pub fn empty() -> Self {
        Self {
            indexer: Indexer::empty(),
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub(crate) fn from_owned(
        indexer: Indexer<'static>,
        keys: Vec<Vec<u8>>,
        values: Vec<Vec<u8>>,
    ) -> crate::Result<Self> {
        Self::from_parts(
            indexer,
            keys.into_iter().map(Cow::Owned).collect(),
            values.into_iter().map(Cow::Owned).collect(),
        )
    }

    /// Reads a serialized table, copying the whole stream into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the data is truncated.
    pub fn read<R: Read>(mut reader: R) -> crate::Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Chd::mmap(&data)?.into_owned())
    }
}

impl<'a> Chd<'a> {
    /// Assembles a table from an indexer and its slot-ordered entries.
    ///
    /// This allows pairing an indexer stored on its own with keys and values
    /// kept elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::LengthMismatch`] if `keys` and `values` differ
    /// in length.
    pub fn from_parts(
        indexer: Indexer<'a>,
        keys: Vec<Cow<'a, [u8]>>,
        values: Vec<Cow<'a, [u8]>>,
    ) -> crate::Result<Self> {
        if keys.len() != values.len() {
            return Err(BuildError::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            }
            .into());
        }
        Ok(Self {
            indexer,
            keys,
            values,
        })
    }

    /// Creates a table aliasing the serialized form in `data`.
    ///
    /// The indexer is decoded in place and every key and value is a slice of
    /// `data`; only the two slice arrays are allocated. Bytes past the last
    /// entry are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is shorter than its length prefixes claim.
    pub fn mmap(data: &'a [u8]) -> crate::Result<Self> {
        let mut reader = SliceReader::new(data);
        let indexer = Indexer::mmap_from(&mut reader)?;

        let n = reader.read_u32("entry count")? as usize;
        // Each entry carries at least its two length prefixes.
        let capacity = n.min(reader.remaining() / 8);
        let mut keys = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(capacity);

        for _ in 0..n {
            let key_len = reader.read_u32("key length")? as usize;
            let value_len = reader.read_u32("value length")? as usize;
            keys.push(Cow::Borrowed(reader.read_bytes(key_len, "key")?));
            values.push(Cow::Borrowed(reader.read_bytes(value_len, "value")?));
        }

        log::trace!(
            "Mapped CHD table with {n} entries from {} of {} bytes",
            reader.position(),
            data.len()
        );

        Ok(Self {
            indexer,
            keys,
            values,
        })
    }

    /// Returns the value stored for `key`, or `None` if `key` was not part of
    /// the build set.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        if self.keys.is_empty() {
            return None;
        }
        let slot = self.indexer.get(key, self.keys.len()) as usize;
        if **self.keys.get(slot)? != *key {
            return None;
        }
        self.values.get(slot).map(|value| &**value)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over all entries in slot order.
    pub fn iter(&self) -> ChdIter<'_, 'a> {
        ChdIter {
            table: self,
            slot: 0,
        }
    }

    pub fn indexer(&self) -> &Indexer<'a> {
        &self.indexer
    }

    /// Replaces the indexer, keeping the entries.
    ///
    /// The new indexer must have been built for exactly these entries.
    pub fn with_indexer(self, indexer: Indexer<'a>) -> Self {
        Self { indexer, ..self }
    }

    /// Exact number of bytes [`write`](Self::write) produces.
    pub fn serialized_len(&self) -> usize {
        let entries: usize = self
            .keys
            .iter()
            .zip(&self.values)
            .map(|(key, value)| 8 + key.len() + value.len())
            .sum();
        self.indexer.serialized_len() + 4 + entries
    }

    /// Serializes the table. The output can be passed to [`mmap`](Self::mmap)
    /// or [`read`](Self::read).
    ///
    /// Issues many small writes, so an unbuffered sink should be wrapped in
    /// a [`BufWriter`](std::io::BufWriter).
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails or a length exceeds `u32::MAX`.
    pub fn write<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        self.indexer.write(writer)?;
        write_len(writer, self.keys.len(), "entry count")?;

        for (key, value) in self.keys.iter().zip(&self.values) {
            write_len(writer, key.len(), "key")?;
            write_len(writer, value.len(), "value")?;
            writer.write_all(key)?;
            writer.write_all(value)?;
        }
        Ok(())
    }

    /// Summarizes the table layout.
    pub fn info(&self) -> ChdInfo {
        let indexer_length = self.indexer.serialized_len() as u64;
        let bits_per_key = if self.keys.is_empty() {
            0.0
        } else {
            (indexer_length * 8) as f64 / self.keys.len() as f64
        };
        ChdInfo {
            entry_count: self.keys.len() as u64,
            bucket_count: self.indexer.bucket_count() as u64,
            empty_buckets: self.indexer.empty_bucket_count() as u64,
            hash_function_count: self.indexer.hash_functions().len() as u64,
            max_selector: self.indexer.max_selector(),
            indexer_length,
            table_length: self.serialized_len() as u64,
            bits_per_key,
        }
    }

    /// Whether any part of the table aliases a caller-owned buffer.
    pub fn is_borrowed(&self) -> bool {
        self.indexer.is_borrowed()
            || self
                .keys
                .iter()
                .chain(&self.values)
                .any(|bytes| matches!(bytes, Cow::Borrowed(_)))
    }

    /// Detaches the table from any borrowed buffer.
    pub fn into_owned(self) -> Chd<'static> {
        Chd {
            indexer: self.indexer.into_owned(),
            keys: self
                .keys
                .into_iter()
                .map(|key| Cow::Owned(key.into_owned()))
                .collect(),
            values: self
                .values
                .into_iter()
                .map(|value| Cow::Owned(value.into_owned()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for Chd<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chd")
            .field("indexer", &self.indexer)
            .field("len", &self.keys.len())
            .finish()
    }
}

impl<'t, 'a> IntoIterator for &'t Chd<'a> {
    type Item = (&'t [u8], &'t [u8]);
    type IntoIter = ChdIter<'t, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`Chd`] in slot order.
///
/// Iteration cannot be rewound; call [`Chd::iter`] again to start over.
#[derive(Clone, Debug)]
pub struct ChdIter<'t, 'a> {
    table: &'t Chd<'a>,
    slot: usize,
}

impl<'t> Iterator for ChdIter<'t, '_> {
    type Item = (&'t [u8], &'t [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.table.keys.get(self.slot)?;
        let value = self.table.values.get(self.slot)?;
        self.slot += 1;
        Some((&**key, &**value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.keys.len().saturating_sub(self.slot);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChdIter<'_, '_> {}

#[cfg(test)]
mod tests {
    use crate::*;
    use std::borrow::Cow;
    use test_log::test;

    fn build(entries: &[(&str, &str)]) -> Chd<'static> {
        let mut builder = ChdBuilder::default();
        builder.extend(entries.iter().copied());
        builder.build().unwrap()
    }

    fn fruits() -> Chd<'static> {
        build(&[
            ("apple", "1"),
            ("banana", "2"),
            ("cherry", "3"),
            ("date", "4"),
            ("elderberry", "5"),
        ])
    }

    #[test]
    fn test_basic() {
        let table = fruits();
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(b"apple"), Some(&b"1"[..]));
        assert_eq!(table.get(b"elderberry"), Some(&b"5"[..]));
        assert_eq!(table.get(b"steins"), None);
        assert_eq!(table.get(b"gate"), None);
        assert_eq!(table.get(b"applE"), None);
        assert!(!table.is_borrowed());
    }

    #[test]
    fn test_mmap_round_trip() {
        let table = fruits();
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), table.serialized_len());

        let aliased = Chd::mmap(&bytes).unwrap();
        assert!(aliased.is_borrowed());
        assert_eq!(aliased, table);
        assert_eq!(aliased.indexer().hash_functions(), table.indexer().hash_functions());
        assert_eq!(aliased.indexer().indices(), table.indexer().indices());
        for (key, value) in &table {
            assert_eq!(aliased.get(key), Some(value));
        }
        assert_eq!(aliased.get(b"fig"), None);

        // Keys and values point into the buffer itself.
        let range = bytes.as_ptr_range();
        for (key, _) in aliased.iter().filter(|(key, _)| !key.is_empty()) {
            assert!(range.contains(&key.as_ptr()));
        }
    }

    #[test]
    fn test_read_round_trip() {
        let table = fruits();
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();

        let copied = Chd::read(bytes.as_slice()).unwrap();
        drop(bytes);
        assert!(!copied.is_borrowed());
        assert_eq!(copied, table);
        assert_eq!(copied.get(b"cherry"), Some(&b"3"[..]));
    }

    #[test]
    fn test_write_layout() {
        let table = build(&[("k", "value")]);
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();

        let indexer_len = table.indexer().serialized_len();
        let mut expected = Vec::new();
        table.indexer().write(&mut expected).unwrap();
        assert_eq!(&bytes[..indexer_len], &expected[..]);

        let mut tail = vec![1, 0, 0, 0, 1, 0, 0, 0, 5, 0, 0, 0];
        tail.extend_from_slice(b"kvalue");
        assert_eq!(&bytes[indexer_len..], &tail[..]);
    }

    #[test]
    fn test_empty_round_trip() {
        let table = ChdBuilder::default().build().unwrap();
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0u8; 12]);

        let aliased = Chd::mmap(&bytes).unwrap();
        assert_eq!(aliased.len(), 0);
        assert_eq!(aliased.get(b"anything"), None);
        assert_eq!(aliased.iter().next(), None);
        assert_eq!(aliased, table);
        assert!(aliased.indexer().hash_functions().is_empty());
        assert!(aliased.indexer().indices().is_empty());
    }

    #[test]
    fn test_singleton_round_trip() {
        let table = build(&[("k", "v")]);
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();
        let aliased = Chd::mmap(&bytes).unwrap();
        assert_eq!(aliased, table);
        assert_eq!(aliased.get(b"k"), Some(&b"v"[..]));
        assert_eq!(aliased.get(b"x"), None);
    }

    #[test]
    fn test_truncated_input() {
        let table = fruits();
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();

        for len in 0..bytes.len() {
            let err = Chd::mmap(&bytes[..len]).unwrap_err();
            assert!(
                matches!(err, Error::Decode(DecodeError::UnexpectedEof { .. })),
                "length {len}: {err:?}"
            );
            Chd::read(&bytes[..len]).unwrap_err();
        }

        bytes.extend_from_slice(b"trailing garbage");
        assert_eq!(Chd::mmap(&bytes).unwrap(), table);
    }

    #[test]
    fn test_corrupt_lengths() {
        let table = fruits();
        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();
        let count_offset = table.indexer().serialized_len();

        // Entry count far beyond the buffer.
        let mut corrupt = bytes.clone();
        corrupt[count_offset..count_offset + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        Chd::mmap(&corrupt).unwrap_err();

        // First key length past the end.
        let mut corrupt = bytes.clone();
        corrupt[count_offset + 4..count_offset + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        Chd::mmap(&corrupt).unwrap_err();

        // Hash function count past the end.
        let mut corrupt = bytes;
        corrupt[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        Chd::mmap(&corrupt).unwrap_err();
    }

    /// Accepts `budget` bytes, then fails every write with a broken pipe.
    struct FailingWriter {
        budget: usize,
    }

    impl std::io::Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            let written = buf.len().min(self.budget);
            self.budget -= written;
            Ok(written)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl std::io::Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::ConnectionReset.into())
        }
    }

    #[test]
    fn test_io_errors_are_passed_through() {
        let table = fruits();
        let indexer_len = table.indexer().serialized_len();
        for budget in [0, 2, indexer_len, indexer_len + 6, table.serialized_len() - 1] {
            let err = table.write(&mut FailingWriter { budget }).unwrap_err();
            match err {
                Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
                other => panic!("budget {budget}: unexpected error {other:?}"),
            }
        }
        table
            .write(&mut FailingWriter {
                budget: table.serialized_len(),
            })
            .unwrap();

        let err = Chd::read(FailingReader).unwrap_err();
        assert!(matches!(
            err,
            Error::Io(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset
        ));
    }

    #[test]
    fn test_out_of_range_selector_falls_back_to_key_check() {
        // Every bucket names a hash function that does not exist, so all keys
        // land on slot 0 and only the stored key decides membership.
        let indexer = Indexer::from_parts(&[99], &[7, 7, 7]);
        let table = Chd::from_parts(
            indexer,
            vec![Cow::Borrowed(&b"zero"[..]), Cow::Borrowed(&b"one"[..])],
            vec![Cow::Borrowed(&b"0"[..]), Cow::Borrowed(&b"1"[..])],
        )
        .unwrap();
        assert_eq!(table.get(b"zero"), Some(&b"0"[..]));
        assert_eq!(table.get(b"one"), None);
        assert_eq!(table.get(b"two"), None);
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let err = Chd::from_parts(Indexer::empty(), vec![Cow::Borrowed(&b"k"[..])], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::LengthMismatch { keys: 1, values: 0 })
        ));
    }

    #[test]
    fn test_swap_indexer() {
        let table = fruits();
        let mut index_bytes = Vec::new();
        table.indexer().write(&mut index_bytes).unwrap();
        let mut table_bytes = Vec::new();
        table.write(&mut table_bytes).unwrap();

        let indexer = Indexer::read(index_bytes.as_slice()).unwrap();
        let swapped = Chd::mmap(&table_bytes).unwrap().with_indexer(indexer);
        assert_eq!(swapped, table);
        assert_eq!(swapped.get(b"date"), Some(&b"4"[..]));
    }

    #[test]
    fn test_iterator() {
        let table = fruits();
        let iter = table.iter();
        assert_eq!(iter.len(), 5);

        let mut collected: Vec<_> = iter.collect();
        assert_eq!(collected.len(), 5);
        collected.sort();
        assert_eq!(
            collected,
            vec![
                (&b"apple"[..], &b"1"[..]),
                (&b"banana"[..], &b"2"[..]),
                (&b"cherry"[..], &b"3"[..]),
                (&b"date"[..], &b"4"[..]),
                (&b"elderberry"[..], &b"5"[..]),
            ]
        );

        // Slot order matches the indexer.
        for (slot, (key, _)) in table.iter().enumerate() {
            assert_eq!(table.indexer().get(key, table.len()), slot as u64);
        }

        // A fresh iterator starts over.
        let first: Vec<_> = table.iter().take(2).collect();
        let again: Vec<_> = table.iter().take(2).collect();
        assert_eq!(first, again);
        assert_eq!(table.iter().skip(3).count(), 2);
    }

    #[test]
    fn test_info() {
        let table = fruits();
        let info = table.info();
        assert_eq!(info.entry_count, 5);
        assert_eq!(info.bucket_count, 3);
        assert_eq!(info.table_length, table.serialized_len() as u64);
        assert_eq!(info.indexer_length, table.indexer().serialized_len() as u64);
        assert!(info.hash_function_count >= 1);
        assert!(info.bits_per_key > 0.0);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["entry_count"], 5);

        let empty = Chd::empty().info();
        assert_eq!(empty.entry_count, 0);
        assert_eq!(empty.max_selector, None);
        assert_eq!(empty.bits_per_key, 0.0);
    }
}
