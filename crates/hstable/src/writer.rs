//! Sealing writer for HSTable files.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{filename, Footer, Header, FILE_FLAG_LARGE, FOOTER_SIZE, HEADER_SIZE};
use crate::record::{encode_record, FLAG_TOMBSTONE};
use crate::{key_hash, FormatError, Location};

/// Writes a standard HSTable: header, appended records, then a sealing
/// [`seal`](HSTableWriter::seal) call that emits the offset array and
/// footer and fsyncs.
///
/// Every append returns the [`Location`] the record will have once the
/// file is sealed, so callers can index what they wrote.
pub struct HSTableWriter {
    file: BufWriter<File>,
    path: PathBuf,
    file_id: u32,
    offsets: Vec<(u64, u32)>,
    cursor: u32,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl HSTableWriter {
    /// Creates `<dir>/<zero-padded file_id>.kdb` and writes its header.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists — file-ids are never reused, so a
    /// collision means the caller's id assignment went wrong.
    pub fn create(dir: &Path, file_id: u32) -> Result<Self, FormatError> {
        let path = dir.join(filename(file_id));
        let raw = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let mut file = BufWriter::new(raw);
        file.write_all(&Header::new(file_id, 0).encode())?;

        Ok(Self {
            file,
            path,
            file_id,
            offsets: Vec::new(),
            cursor: HEADER_SIZE as u32,
            buf: Vec::with_capacity(256),
        })
    }

    /// The id of the file being written.
    #[must_use]
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Appends one record with explicit flags.
    ///
    /// `size_uncompressed` is the plaintext length of the value: equal to
    /// `value.len()` for uncompressed values, the declared original size
    /// for compressed ones.
    ///
    /// # Errors
    ///
    /// `FormatError::TooLarge` when the key, value, or resulting file
    /// outgrows the format's 32-bit size fields; I/O errors from the
    /// underlying writes.
    pub fn append(
        &mut self,
        flags: u8,
        key: &[u8],
        value: &[u8],
        size_uncompressed: u32,
    ) -> Result<Location, FormatError> {
        self.buf.clear();
        encode_record(&mut self.buf, flags, key, value, size_uncompressed)?;

        let record_offset = self.cursor;
        let grown = u64::from(self.cursor) + self.buf.len() as u64;
        if grown > u64::from(u32::MAX) {
            return Err(FormatError::TooLarge {
                what: "file",
                size: grown,
            });
        }

        self.file.write_all(&self.buf)?;
        self.offsets.push((key_hash(key), record_offset));
        self.cursor = grown as u32;
        Ok(Location::sealed(self.file_id, record_offset))
    }

    /// Appends a plain record.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<Location, FormatError> {
        let size = u32::try_from(value.len()).map_err(|_| FormatError::TooLarge {
            what: "value",
            size: value.len() as u64,
        })?;
        self.append(0, key, value, size)
    }

    /// Appends a deletion tombstone: the key with zero value bytes.
    pub fn delete(&mut self, key: &[u8]) -> Result<Location, FormatError> {
        self.append(FLAG_TOMBSTONE, key, &[], 0)
    }

    /// Writes the offset array and footer, flushes, and fsyncs.
    ///
    /// Consumes the writer: a sealed HSTable is immutable.
    pub fn seal(mut self) -> Result<PathBuf, FormatError> {
        let offset_array_start = self.cursor;
        for (hash, offset) in &self.offsets {
            self.file.write_u64::<LittleEndian>(*hash)?;
            self.file.write_u32::<LittleEndian>(*offset)?;
        }

        let filesize = u64::from(self.cursor)
            + self.offsets.len() as u64 * crate::OFFSET_ARRAY_ENTRY_SIZE as u64
            + FOOTER_SIZE as u64;
        let footer = Footer {
            num_records: self.offsets.len() as u32,
            offset_array_start,
            filesize,
        };
        self.file.write_all(&footer.encode())?;

        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        log::debug!(
            target: "galekv::hstable",
            "sealed file {} with {} records, {} bytes",
            self.file_id,
            self.offsets.len(),
            filesize
        );
        Ok(self.path)
    }

    /// Writes a complete *large* HSTable: header, exactly one record whose
    /// value spans the remainder, offset array, footer. Returns the
    /// record's location.
    ///
    /// # Errors
    ///
    /// As [`append`](HSTableWriter::append), plus creation failure when
    /// the file already exists.
    pub fn write_large(
        dir: &Path,
        file_id: u32,
        flags: u8,
        key: &[u8],
        value: &[u8],
        size_uncompressed: u32,
    ) -> Result<Location, FormatError> {
        let path = dir.join(filename(file_id));
        let raw = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let mut file = BufWriter::new(raw);
        file.write_all(&Header::new(file_id, FILE_FLAG_LARGE).encode())?;

        let mut buf = Vec::with_capacity(value.len() + key.len() + 32);
        encode_record(&mut buf, flags, key, value, size_uncompressed)?;
        let record_offset = HEADER_SIZE as u32;
        let offset_array_start = u64::from(record_offset) + buf.len() as u64;
        if offset_array_start > u64::from(u32::MAX) {
            return Err(FormatError::TooLarge {
                what: "file",
                size: offset_array_start,
            });
        }
        file.write_all(&buf)?;

        file.write_u64::<LittleEndian>(key_hash(key))?;
        file.write_u32::<LittleEndian>(record_offset)?;

        let footer = Footer {
            num_records: 1,
            offset_array_start: offset_array_start as u32,
            filesize: offset_array_start
                + crate::OFFSET_ARRAY_ENTRY_SIZE as u64
                + FOOTER_SIZE as u64,
        };
        file.write_all(&footer.encode())?;

        file.flush()?;
        file.get_ref().sync_all()?;
        log::debug!(
            target: "galekv::hstable",
            "sealed large file {} holding a {} byte value",
            file_id,
            value.len()
        );
        Ok(Location::sealed(file_id, record_offset))
    }
}
