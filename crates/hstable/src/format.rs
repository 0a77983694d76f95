//! Fixed-size header and footer codecs plus the format's magic constants.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::Cursor;

use crate::FormatError;

/// Magic bytes opening every HSTable header and closing every footer.
pub const HSTABLE_MAGIC: [u8; 8] = *b"GALEHSTB";

/// On-disk format version. Readers refuse every other value.
pub const HSTABLE_VERSION: u32 = 1;

/// Fixed size of the header at the start of the file.
pub const HEADER_SIZE: usize = 32;

/// Fixed size of the footer at the end of the file.
pub const FOOTER_SIZE: usize = 32;

/// Header flag: the file holds a single oversized record.
pub const FILE_FLAG_LARGE: u32 = 0x01;

/// One offset-array entry: `key_hash(8) | record_offset(4)`.
pub const OFFSET_ARRAY_ENTRY_SIZE: usize = 12;

/// Extension of data files within the database directory.
pub const DATA_FILE_EXT: &str = "kdb";

/// The data filename for a file-id: zero-padded to ten digits so that
/// lexicographic and numeric order agree.
#[must_use]
pub fn filename(file_id: u32) -> String {
    format!("{:010}.{}", file_id, DATA_FILE_EXT)
}

/// Decoded HSTable header.
///
/// ```text
/// magic(8) | version(4 LE) | file_id(4 LE) | flags(4 LE) | pad(12)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub file_id: u32,
    pub flags: u32,
}

impl Header {
    #[must_use]
    pub fn new(file_id: u32, flags: u32) -> Self {
        Self { file_id, flags }
    }

    /// Whether the file holds a single oversized record.
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.flags & FILE_FLAG_LARGE != 0
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&HSTABLE_MAGIC);
        buf[8..12].copy_from_slice(&HSTABLE_VERSION.to_le_bytes());
        buf[12..16].copy_from_slice(&self.file_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Validates magic and version, then decodes the fixed fields.
    ///
    /// # Errors
    ///
    /// `FormatError::Corrupt` on short input, wrong magic, or a version
    /// this build does not read.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Corrupt("file shorter than the header"));
        }
        if bytes[0..8] != HSTABLE_MAGIC {
            return Err(FormatError::Corrupt("header magic mismatch"));
        }
        let mut r = Cursor::new(&bytes[8..HEADER_SIZE]);
        let version = r.read_u32::<LittleEndian>().expect("length checked");
        if version != HSTABLE_VERSION {
            return Err(FormatError::Corrupt("unsupported format version"));
        }
        let file_id = r.read_u32::<LittleEndian>().expect("length checked");
        let flags = r.read_u32::<LittleEndian>().expect("length checked");
        Ok(Self { file_id, flags })
    }
}

/// Decoded HSTable footer.
///
/// ```text
/// num_records(4 LE) | offset_array_start(4 LE) | filesize(8 LE)
/// crc32(4 LE) | magic(8) | pad(4)
/// ```
///
/// The CRC covers the first 16 bytes (the three fixed fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub num_records: u32,
    pub offset_array_start: u32,
    pub filesize: u64,
}

impl Footer {
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        {
            let mut w = &mut buf[0..16];
            w.write_u32::<LittleEndian>(self.num_records).unwrap();
            w.write_u32::<LittleEndian>(self.offset_array_start).unwrap();
            w.write_u64::<LittleEndian>(self.filesize).unwrap();
        }
        let mut hasher = Crc32::new();
        hasher.update(&buf[0..16]);
        buf[16..20].copy_from_slice(&hasher.finalize().to_le_bytes());
        buf[20..28].copy_from_slice(&HSTABLE_MAGIC);
        buf
    }

    /// Validates magic and CRC, then decodes the fixed fields.
    ///
    /// # Errors
    ///
    /// `FormatError::Corrupt` on short input, wrong magic, or a CRC
    /// mismatch — the usual signature of a torn or truncated seal.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < FOOTER_SIZE {
            return Err(FormatError::Corrupt("file shorter than the footer"));
        }
        if bytes[20..28] != HSTABLE_MAGIC {
            return Err(FormatError::Corrupt("footer magic mismatch"));
        }

        let stored_crc = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let mut hasher = Crc32::new();
        hasher.update(&bytes[0..16]);
        if hasher.finalize() != stored_crc {
            return Err(FormatError::Corrupt("footer checksum mismatch"));
        }

        let mut r = Cursor::new(&bytes[0..16]);
        Ok(Self {
            num_records: r.read_u32::<LittleEndian>().expect("length checked"),
            offset_array_start: r.read_u32::<LittleEndian>().expect("length checked"),
            filesize: r.read_u64::<LittleEndian>().expect("length checked"),
        })
    }
}
