//! Reindexing scan over a mapped HSTable.

use crate::format::{Footer, Header, FOOTER_SIZE, HEADER_SIZE};
use crate::record::decode_record_at;
use crate::{key_hash, FormatError};

/// The per-file index rebuilt by [`load_file`]: `(key_hash, record_offset)`
/// pairs in physical scan order. Multiple entries for the same hash are
/// retained, earliest offset first, so the caller sees every version a
/// file holds.
#[derive(Debug)]
pub struct FileIndex {
    pub entries: Vec<(u64, u32)>,
    pub file_size: u64,
    pub is_large: bool,
}

/// Scans a mapped data file and rebuilds its index.
///
/// The scan is best-effort in the way crash recovery needs it to be:
///
/// - a record whose CRC fails is skipped, and the walk continues at the
///   next record (its size fields still frame it);
/// - a record whose declared sizes would cross the end of the mapping
///   terminates the walk — the tail was torn off mid-write;
/// - a missing or damaged footer is survivable: whatever records were
///   scanned before the damage are returned.
///
/// Only header damage is fatal: without a valid magic, version, and
/// matching file-id nothing in the file can be trusted.
///
/// # Errors
///
/// `FormatError::Corrupt` when the header fails validation or its
/// file-id disagrees with `file_id` (taken from the filename).
pub fn load_file(data: &[u8], file_id: u32) -> Result<FileIndex, FormatError> {
    let header = Header::decode(data)?;
    if header.file_id != file_id {
        return Err(FormatError::Corrupt("header file id disagrees with filename"));
    }

    if header.is_large() {
        return load_large(data, file_id);
    }

    // A valid footer bounds the record region; without one, scan to the
    // end of the mapping and let the bounds checks find the tear.
    let mut records_end = data.len();
    if data.len() >= HEADER_SIZE + FOOTER_SIZE {
        match Footer::decode(&data[data.len() - FOOTER_SIZE..]) {
            Ok(footer) => {
                let start = footer.offset_array_start as usize;
                if start >= HEADER_SIZE && start <= data.len() - FOOTER_SIZE {
                    records_end = start;
                } else {
                    log::warn!(
                        target: "galekv::hstable",
                        "file {}: footer offset array start {} out of bounds, scanning to end",
                        file_id,
                        start
                    );
                }
            }
            Err(e) => {
                log::warn!(
                    target: "galekv::hstable",
                    "file {}: unreadable footer ({}), scanning to end",
                    file_id,
                    e
                );
            }
        }
    }

    let mut entries = Vec::new();
    let mut cursor = HEADER_SIZE;
    while cursor < records_end {
        let (record, next) = match decode_record_at(&data[..records_end], cursor) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!(
                    target: "galekv::hstable",
                    "file {}: stopping scan at offset {}: {}",
                    file_id,
                    cursor,
                    e
                );
                break;
            }
        };

        if record.crc_matches() {
            entries.push((key_hash(record.key), cursor as u32));
        } else {
            log::warn!(
                target: "galekv::hstable",
                "file {}: record at offset {} failed its checksum, skipping",
                file_id,
                cursor
            );
        }
        cursor = next;
    }

    log::debug!(
        target: "galekv::hstable",
        "file {}: indexed {} records over {} bytes",
        file_id,
        entries.len(),
        data.len()
    );
    Ok(FileIndex {
        entries,
        file_size: data.len() as u64,
        is_large: false,
    })
}

fn load_large(data: &[u8], file_id: u32) -> Result<FileIndex, FormatError> {
    let mut entries = Vec::new();
    match decode_record_at(data, HEADER_SIZE) {
        Ok((record, _)) => {
            entries.push((key_hash(record.key), HEADER_SIZE as u32));
        }
        Err(e) => {
            log::warn!(
                target: "galekv::hstable",
                "large file {}: unreadable record ({}), nothing indexed",
                file_id,
                e
            );
        }
    }
    Ok(FileIndex {
        entries,
        file_size: data.len() as u64,
        is_large: true,
    })
}
