use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::EncodeError;
use crate::reader::{Word, WordArray};

/// Converts an in-memory length into its 32-bit wire form.
pub fn wire_len(len: usize, what: &'static str) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthOverflow { what, len })
}

/// Writes a little-endian `u32` length or count prefix.
pub fn write_len<W: Write>(writer: &mut W, len: usize, what: &'static str) -> crate::Result<()> {
    let len = wire_len(len, what)?;
    writer.write_u32::<LittleEndian>(len)?;
    Ok(())
}

/// Writes a count-prefixed word array.
///
/// The array already holds its little-endian encoding, so the payload is
/// written in a single call.
pub fn write_words<W: Write, T: Word>(
    writer: &mut W,
    words: &WordArray<'_, T>,
    what: &'static str,
) -> crate::Result<()> {
    write_len(writer, words.len(), what)?;
    writer.write_all(words.as_bytes())?;
    Ok(())
}
