//! # Config — Options for the GaleKV storage core
//!
//! Two small option records plus the binary codec for the `options.kdb`
//! file that sits in every database directory.
//!
//! `options.kdb` pins down the parts of the on-disk format that cannot be
//! inferred from the data files themselves: the format version, the
//! identity of the key-hash function, and the value compression in use.
//! A store written with one hash function is unreadable with another, so
//! the engine refuses to open a directory whose options disagree with its
//! own build.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

/// Current on-disk format version. Incremented on any layout change;
/// readers refuse every other value.
pub const FORMAT_VERSION: u32 = 1;

/// Magic bytes opening the `options.kdb` file.
pub const OPTIONS_MAGIC: [u8; 8] = *b"GALEOPTS";

/// Encoded size of the options file.
pub const OPTIONS_FILE_SIZE: usize = 16;

/// Name of the options file within a database directory.
pub const OPTIONS_FILENAME: &str = "options.kdb";

/// Name of the advisory lock file within a database directory.
pub const LOCK_FILENAME: &str = "LOCK";

/// Errors from decoding an `options.kdb` file.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("options file is {0} bytes, expected {OPTIONS_FILE_SIZE}")]
    Truncated(usize),

    #[error("options file magic mismatch")]
    BadMagic,

    #[error("unsupported format version {0} (this build reads version {FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("unknown key-hash identifier {0}")]
    UnknownHash(u8),

    #[error("unknown compression identifier {0}")]
    UnknownCompression(u8),
}

/// Per-read configuration, as accepted by the engine's lookup calls.
///
/// Absent fields take the defaults: checksums verified, mappings cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Verify each record's CRC32 before returning it.
    pub verify_checksums: bool,
    /// Retain the file mapping in the engine's cache after the read.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            fill_cache: true,
        }
    }
}

/// Identity of the 64-bit key-hash function. Part of the format: every
/// reader of a database must use the hash it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyHashKind {
    Xxh64 = 0,
}

impl KeyHashKind {
    fn from_u8(v: u8) -> Result<Self, OptionsError> {
        match v {
            0 => Ok(Self::Xxh64),
            other => Err(OptionsError::UnknownHash(other)),
        }
    }
}

/// Value compression applied by the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionKind {
    None = 0,
    #[default]
    Lz4 = 1,
}

impl CompressionKind {
    fn from_u8(v: u8) -> Result<Self, OptionsError> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            other => Err(OptionsError::UnknownCompression(other)),
        }
    }
}

/// Store-wide options fixed at database creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    pub compression: CompressionKind,
}

/// The decoded contents of `options.kdb`.
///
/// Layout (16 bytes, little-endian):
///
/// ```text
/// magic(8) | format_version(4) | key_hash(1) | compression(1) | pad(2)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionsFile {
    pub format_version: u32,
    pub key_hash: KeyHashKind,
    pub compression: CompressionKind,
}

impl OptionsFile {
    /// Options for a freshly created store.
    pub fn for_store(options: &StoreOptions) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            key_hash: KeyHashKind::Xxh64,
            compression: options.compression,
        }
    }

    /// Serializes to the fixed 16-byte layout.
    pub fn encode(&self) -> [u8; OPTIONS_FILE_SIZE] {
        let mut buf = [0u8; OPTIONS_FILE_SIZE];
        buf[0..8].copy_from_slice(&OPTIONS_MAGIC);
        {
            let mut w = &mut buf[8..];
            w.write_u32::<LittleEndian>(self.format_version).unwrap();
            w.write_u8(self.key_hash as u8).unwrap();
            w.write_u8(self.compression as u8).unwrap();
        }
        buf
    }

    /// Decodes and validates an `options.kdb` image.
    ///
    /// # Errors
    ///
    /// Rejects short files, wrong magic, any format version other than
    /// [`FORMAT_VERSION`], and unknown hash or compression identifiers.
    pub fn decode(bytes: &[u8]) -> Result<Self, OptionsError> {
        if bytes.len() < OPTIONS_FILE_SIZE {
            return Err(OptionsError::Truncated(bytes.len()));
        }
        if bytes[0..8] != OPTIONS_MAGIC {
            return Err(OptionsError::BadMagic);
        }

        let mut r = Cursor::new(&bytes[8..]);
        let format_version = r.read_u32::<LittleEndian>().expect("length checked");
        if format_version != FORMAT_VERSION {
            return Err(OptionsError::UnsupportedVersion(format_version));
        }
        let mut tail = [0u8; 2];
        r.read_exact(&mut tail).expect("length checked");

        Ok(Self {
            format_version,
            key_hash: KeyHashKind::from_u8(tail[0])?,
            compression: CompressionKind::from_u8(tail[1])?,
        })
    }
}
