//! Read path: point lookups and location-based record retrieval.
//!
//! `get()` probes the global index at the key's hash and resolves the
//! newest location whose record actually carries the queried key bytes —
//! older entries and hash collisions fall away, tombstones read as
//! absent. `get_entry()` fetches the record behind a location directly;
//! the iterator uses it together with `live_location()` to filter out
//! superseded records.

use anyhow::{bail, Result};
use config::ReadOptions;
use hstable::{decode_record_at, key_hash, Location};

use crate::EngineInner;

/// An owned view of one record: the key and raw value bytes as stored,
/// plus the metadata needed to interpret the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    /// Value bytes exactly as stored — still LZ4-framed when
    /// `compressed` is set.
    pub value: Vec<u8>,
    pub tombstone: bool,
    pub compressed: bool,
    pub multipart: bool,
    /// Plaintext length of the value.
    pub size_uncompressed: u32,
}

impl EngineInner {
    /// Fetches the record at a sealed location.
    ///
    /// The mapping is reused from the cache when possible and retained
    /// there unless `fill_cache` is off. With `verify_checksums` the
    /// record's CRC is checked before anything is returned.
    ///
    /// # Errors
    ///
    /// Unsealed locations, missing files, unparseable records, and CRC
    /// mismatches all fail; the caller decides whether that skips a
    /// record, a file, or the whole operation.
    pub(crate) fn get_entry(&self, options: &ReadOptions, location: Location) -> Result<Entry> {
        if !location.is_sealed() {
            bail!("location {} does not point into a sealed file", location);
        }

        let mapped = self.files.open(location.file_id(), options.fill_cache)?;
        let (record, _) = decode_record_at(&mapped[..], location.offset() as usize)?;
        if options.verify_checksums && !record.crc_matches() {
            bail!(
                "record at {} in file {} failed its checksum",
                location,
                mapped.file_id
            );
        }

        Ok(Entry {
            key: record.key.to_vec(),
            value: record.value.to_vec(),
            tombstone: record.is_tombstone(),
            compressed: record.is_compressed(),
            multipart: record.is_multipart(),
            size_uncompressed: record.size_uncompressed,
        })
    }

    /// Point lookup: the newest record whose key equals `key`.
    ///
    /// Returns the entry together with its location so callers can detect
    /// stale references. Absent keys and tombstones return `Ok(None)`.
    pub(crate) fn get(
        &self,
        options: &ReadOptions,
        key: &[u8],
    ) -> Result<Option<(Entry, Location)>> {
        let locations = self.index.lookup(key_hash(key));

        // Newest first. Same-hash-different-key records (collisions) are
        // passed over; unreadable candidates are passed over too, since a
        // later file may be mid-deletion while an older copy still serves.
        for location in locations.iter().rev() {
            let entry = match self.get_entry(options, *location) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!(
                        target: "galekv::engine",
                        "get: unreadable candidate at {}: {}",
                        location,
                        e
                    );
                    continue;
                }
            };
            if entry.key != key {
                log::trace!(
                    target: "galekv::engine",
                    "get: hash collision at {}, probing older locations",
                    location
                );
                continue;
            }
            if entry.tombstone {
                return Ok(None);
            }
            return Ok(Some((entry, *location)));
        }
        Ok(None)
    }

    /// Like [`get`](EngineInner::get) but resolves only the live
    /// location, without copying value bytes to the caller.
    pub(crate) fn live_location(
        &self,
        options: &ReadOptions,
        key: &[u8],
    ) -> Result<Option<Location>> {
        Ok(self.get(options, key)?.map(|(_, location)| location))
    }
}
