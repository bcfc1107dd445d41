use std::borrow::Cow;
use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeError;

/// Fixed-width unsigned integer stored little-endian in a serialized table.
pub trait Word: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decodes one word from exactly [`SIZE`](Self::SIZE) bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encodes one word into exactly [`SIZE`](Self::SIZE) bytes.
    fn encode(self, out: &mut [u8]);
}

impl Word for u16 {
    const SIZE: usize = 2;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }

    fn encode(self, out: &mut [u8]) {
        LittleEndian::write_u16(out, self);
    }
}

impl Word for u64 {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_u64(bytes)
    }

    fn encode(self, out: &mut [u8]) {
        LittleEndian::write_u64(out, self);
    }
}

/// Array of little-endian words kept in its serialized byte form.
///
/// The bytes are either borrowed from a caller-owned buffer (the aliasing
/// path) or owned (built or copied). Words are decoded on access, so the
/// backing buffer needs no particular alignment and the host byte order does
/// not matter.
#[derive(Clone, PartialEq, Eq)]
pub struct WordArray<'a, T: Word> {
    bytes: Cow<'a, [u8]>,
    phantom: PhantomData<T>,
}

impl<'a, T: Word> WordArray<'a, T> {
    /// Wraps `bytes`, whose length must be a multiple of `T::SIZE`.
    fn from_bytes(bytes: Cow<'a, [u8]>) -> Self {
        debug_assert_eq!(bytes.len() % T::SIZE, 0);
        Self {
            bytes,
            phantom: PhantomData,
        }
    }

    /// Encodes `words` into a new owned array.
    pub fn from_words(words: &[T]) -> WordArray<'static, T> {
        let mut bytes = vec![0u8; words.len() * T::SIZE];
        for (word, chunk) in words.iter().zip(bytes.chunks_exact_mut(T::SIZE)) {
            word.encode(chunk);
        }
        WordArray::from_bytes(Cow::Owned(bytes))
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the word at `index`, or `None` when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        let start = index.checked_mul(T::SIZE)?;
        let end = start.checked_add(T::SIZE)?;
        self.bytes.get(start..end).map(T::decode)
    }

    /// Serialized little-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the words alias a caller-owned buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.bytes, Cow::Borrowed(_))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        self.bytes.chunks_exact(T::SIZE).map(T::decode)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Detaches the array from any borrowed buffer.
    pub fn into_owned(self) -> WordArray<'static, T> {
        WordArray::from_bytes(Cow::Owned(self.bytes.into_owned()))
    }
}

impl<T: Word + std::fmt::Debug> std::fmt::Debug for WordArray<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Bounds-checked cursor over a borrowed byte buffer.
///
/// Every read checks the remaining length first and advances the position by
/// exactly the number of bytes consumed.
#[derive(Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Borrows the next `length` bytes without copying.
    pub fn read_bytes(
        &mut self,
        length: usize,
        what: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining();
        if length > available {
            return Err(DecodeError::UnexpectedEof {
                what,
                needed: length,
                available,
            });
        }
        let start = self.position;
        self.position += length;
        Ok(&self.data[start..self.position])
    }

    /// Reads a little-endian `u32` length or count prefix.
    pub fn read_u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        self.read_bytes(4, what).map(LittleEndian::read_u32)
    }

    /// Aliases `count` little-endian words over the buffer.
    pub fn read_words<T: Word>(
        &mut self,
        count: usize,
        what: &'static str,
    ) -> Result<WordArray<'a, T>, DecodeError> {
        let length = count.checked_mul(T::SIZE).ok_or(DecodeError::UnexpectedEof {
            what,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.read_bytes(length, what)?;
        Ok(WordArray::from_bytes(Cow::Borrowed(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_word_array_from_words() {
        let words = WordArray::from_words(&[1u64, u64::MAX, 0x0102_0304_0506_0708]);
        assert_eq!(words.len(), 3);
        assert!(!words.is_borrowed());
        assert_eq!(words.get(1), Some(u64::MAX));
        assert_eq!(words.get(3), None);
        assert_eq!(&words.as_bytes()[16..24], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(words.to_vec(), vec![1, u64::MAX, 0x0102_0304_0506_0708]);
    }

    #[test]
    fn test_slice_reader_unaligned_words() {
        // A leading byte forces the u64 payload off any natural alignment.
        let mut data = vec![0xAAu8];
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&7u64.to_le_bytes());
        data.extend_from_slice(&9u64.to_le_bytes());

        let mut reader = SliceReader::new(&data);
        assert_eq!(reader.read_bytes(1, "pad").unwrap(), &[0xAA]);
        let count = reader.read_u32("count").unwrap() as usize;
        let words = reader.read_words::<u64>(count, "words").unwrap();
        assert!(words.is_borrowed());
        assert_eq!(words.to_vec(), vec![7, 9]);
        assert_eq!(reader.position(), data.len());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_slice_reader_truncated() {
        let data = [1u8, 0, 0];
        let mut reader = SliceReader::new(&data);
        let err = reader.read_u32("count").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedEof {
                needed: 4,
                available: 3,
                ..
            }
        ));
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 0);

        let mut reader = SliceReader::new(&data);
        reader.read_words::<u16>(usize::MAX, "huge").unwrap_err();
        reader.read_words::<u64>(1, "short").unwrap_err();
        assert_eq!(reader.read_words::<u16>(1, "ok").unwrap().get(0), Some(1));
    }
}
