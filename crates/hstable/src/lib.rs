//! # HSTable — Immutable Data Files
//!
//! The on-disk format of GaleKV's data files and the routines that read
//! and write them.
//!
//! An HSTable is an immutable, append-only file identified by a
//! monotonically increasing 32-bit file-id. Once sealed it is never
//! modified — overwrites and deletes land in later files and shadow the
//! records here; compaction reclaims the space by deleting whole files.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ HEADER (32 bytes)                                            │
//! │ magic(8) | version(4 LE) | file_id(4 LE) | flags(4 LE)       │
//! │ pad(12)                                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ RECORDS                                                      │
//! │ flags(1) | key_size(varint) | value_size_disk(varint)        │
//! │ value_size_uncompressed(varint) | crc32(4 LE) | key | value  │
//! │ ... repeated ...                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ OFFSET ARRAY                                                 │
//! │ key_hash(8 LE) | record_offset(4 LE)  ... per record ...     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 32 bytes)                                │
//! │ num_records(4 LE) | offset_array_start(4 LE)                 │
//! │ filesize(8 LE) | crc32(4 LE) | magic(8) | pad(4)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The record CRC32 (IEEE) covers `key || value`. The footer CRC covers
//! the footer's own first 16 bytes. A *large* HSTable (header flag `0x01`)
//! holds exactly one record whose value spans the rest of the file.
//!
//! ## Key hash
//!
//! Index entries are keyed by [`key_hash`] (xxHash64, seed 0). The hash
//! identity is part of the format: a store written with one hash is
//! unreadable with another, which is why the database's `options.kdb`
//! records it.

mod format;
mod loader;
mod location;
mod record;
mod writer;

pub use format::{
    filename, Footer, Header, DATA_FILE_EXT, FILE_FLAG_LARGE, FOOTER_SIZE, HEADER_SIZE,
    HSTABLE_MAGIC, HSTABLE_VERSION, OFFSET_ARRAY_ENTRY_SIZE,
};
pub use loader::{load_file, FileIndex};
pub use location::Location;
pub use record::{
    decode_record_at, encode_record, RecordRef, FLAG_COMPRESSED, FLAG_MULTIPART, FLAG_TOMBSTONE,
};
pub use writer::HSTableWriter;

use std::io;
use thiserror::Error;

/// Errors that can occur while reading or writing HSTables.
#[derive(Debug, Error)]
pub enum FormatError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A header, footer, or record failed structural validation.
    #[error("corrupt hstable: {0}")]
    Corrupt(&'static str),

    /// A key, value, or file outgrew the format's 32-bit size fields.
    #[error("{what} of {size} bytes exceeds the format's 4 GiB limit")]
    TooLarge { what: &'static str, size: u64 },
}

/// The 64-bit key hash used by every index in the store: xxHash64, seed 0.
#[must_use]
pub fn key_hash(key: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(key, 0)
}

#[cfg(test)]
mod tests;
