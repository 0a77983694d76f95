//! Record encode/decode over raw file bytes.

use crc32fast::Hasher as Crc32;
use integer_encoding::VarInt;

use crate::FormatError;

/// Record flag: deletion tombstone (key present, zero value bytes).
pub const FLAG_TOMBSTONE: u8 = 0x01;

/// Record flag: the value bytes are LZ4-framed.
pub const FLAG_COMPRESSED: u8 = 0x02;

/// Record flag: the value was streamed in multiple framed parts.
pub const FLAG_MULTIPART: u8 = 0x04;

/// A record parsed in place from a mapped file.
///
/// The borrowed slices alias the mapping and stay valid for its lifetime;
/// callers that outlive the mapping copy them out.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    pub flags: u8,
    pub key: &'a [u8],
    pub value: &'a [u8],
    /// Plaintext length of the value. Equals `value.len()` when the
    /// compressed flag is clear.
    pub size_uncompressed: u32,
    /// CRC32 stored with the record, covering `key || value`.
    pub stored_crc: u32,
}

impl<'a> RecordRef<'a> {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.flags & FLAG_MULTIPART != 0
    }

    /// Recomputes the CRC over `key || value` and compares it with the
    /// stored one.
    #[must_use]
    pub fn crc_matches(&self) -> bool {
        let mut hasher = Crc32::new();
        hasher.update(self.key);
        hasher.update(self.value);
        hasher.finalize() == self.stored_crc
    }
}

/// Serializes one record into `buf`.
///
/// Layout: `flags(1) | key_size(varint) | value_size_disk(varint) |
/// value_size_uncompressed(varint) | crc32(4 LE) | key | value`.
///
/// # Errors
///
/// `FormatError::TooLarge` when the key or value cannot be described by
/// the format's 32-bit size fields.
pub fn encode_record(
    buf: &mut Vec<u8>,
    flags: u8,
    key: &[u8],
    value: &[u8],
    size_uncompressed: u32,
) -> Result<(), FormatError> {
    let key_size = u32::try_from(key.len()).map_err(|_| FormatError::TooLarge {
        what: "key",
        size: key.len() as u64,
    })?;
    let value_size = u32::try_from(value.len()).map_err(|_| FormatError::TooLarge {
        what: "value",
        size: value.len() as u64,
    })?;

    buf.push(flags);
    buf.extend_from_slice(&key_size.encode_var_vec());
    buf.extend_from_slice(&value_size.encode_var_vec());
    buf.extend_from_slice(&size_uncompressed.encode_var_vec());

    let mut hasher = Crc32::new();
    hasher.update(key);
    hasher.update(value);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());

    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    Ok(())
}

/// Parses the record starting at `offset`, returning it together with the
/// offset one past its end.
///
/// Every declared size is bounds-checked against the mapping before any
/// payload byte is touched; a record that would run past the end of the
/// data is rejected, which is how truncated files are detected.
///
/// # Errors
///
/// `FormatError::Corrupt` on malformed varints or sizes that cross the
/// end of `data`. A CRC mismatch is *not* an error here — callers decide
/// whether to skip or fail via [`RecordRef::crc_matches`].
pub fn decode_record_at(data: &[u8], offset: usize) -> Result<(RecordRef<'_>, usize), FormatError> {
    let mut cursor = offset;
    if cursor >= data.len() {
        return Err(FormatError::Corrupt("record offset past end of file"));
    }

    let flags = data[cursor];
    cursor += 1;

    let (key_size, n) = u32::decode_var(&data[cursor..])
        .ok_or(FormatError::Corrupt("unreadable key size"))?;
    cursor += n;
    let (value_size, n) = u32::decode_var(&data[cursor..])
        .ok_or(FormatError::Corrupt("unreadable value size"))?;
    cursor += n;
    let (size_uncompressed, n) = u32::decode_var(&data[cursor..])
        .ok_or(FormatError::Corrupt("unreadable uncompressed size"))?;
    cursor += n;

    if data.len() - cursor < 4 {
        return Err(FormatError::Corrupt("record checksum past end of file"));
    }
    let stored_crc = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap());
    cursor += 4;

    let payload = (key_size as u64) + (value_size as u64);
    if payload > (data.len() - cursor) as u64 {
        return Err(FormatError::Corrupt("record payload runs past end of file"));
    }

    let key = &data[cursor..cursor + key_size as usize];
    cursor += key_size as usize;
    let value = &data[cursor..cursor + value_size as usize];
    cursor += value_size as usize;

    Ok((
        RecordRef {
            flags,
            key,
            value,
            size_uncompressed,
            stored_crc,
        },
        cursor,
    ))
}
