//! Snapshot iteration over live records.

use anyhow::Result;
use config::ReadOptions;
use hstable::{load_file, Location};
use parking_lot::Mutex;

use crate::files::map_readonly;
use crate::multipart::MultipartReader;
use crate::read::Entry;
use crate::snapshot::Snapshot;

/// The iterator capability set: one concrete implementation today
/// ([`StoreIterator`]), with prefix and reverse variants anticipated.
pub trait Iterate {
    /// Primes the first valid position. After return, `is_valid()` is
    /// true iff the iterator holds a record.
    fn begin(&self);

    /// Whether a record is currently held. Pure read of iterator state.
    fn is_valid(&self) -> bool;

    /// Advances; returns whether a new record is now held.
    fn next(&self) -> bool;

    /// The current record's key; `None` when the iterator is invalid.
    fn key(&self) -> Option<Vec<u8>>;

    /// The current record's plaintext value, transparently reassembling
    /// compressed values; `None` when the iterator is invalid.
    fn value(&self) -> Result<Option<Vec<u8>>>;

    /// A part-by-part reader over the current record's compressed value;
    /// `None` when the iterator is invalid.
    fn multipart_value(&self) -> Option<MultipartReader>;
}

#[derive(Default)]
struct IterState {
    index_file: usize,
    index_loc: usize,
    /// Ascending record offsets within the currently loaded file.
    offsets: Vec<u32>,
    current_file: u32,
    has_file: bool,
    is_valid: bool,
    current: Option<Entry>,
}

/// Walks every live record reachable through a snapshot, in ascending
/// offset order within a file and ascending file-id order across files.
///
/// Records superseded by later writes, tombstones, and anything in files
/// that vanished or tore since the snapshot was taken are filtered out.
/// A vanished file is not an error: compaction may delete files at any
/// time, and the snapshot's pins are advisory for external writers.
///
/// The iterator owns its snapshot, so the snapshot's pins are released
/// exactly when the iterator is dropped. All calls serialize on an
/// internal mutex: sharing one iterator across threads is safe, if
/// rarely useful.
pub struct StoreIterator {
    snapshot: Snapshot,
    options: ReadOptions,
    state: Mutex<IterState>,
}

impl StoreIterator {
    pub(crate) fn new(snapshot: Snapshot, options: ReadOptions) -> Self {
        Self {
            snapshot,
            options,
            state: Mutex::new(IterState::default()),
        }
    }

    /// The snapshot this iterator reads through.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Loads the next readable file from the snapshot list, filling
    /// `state.offsets`. Returns `false` once the list is exhausted.
    fn load_next_file(&self, state: &mut IterState) -> bool {
        let file_ids = self.snapshot.file_ids();
        while state.index_file < file_ids.len() {
            let file_id = file_ids[state.index_file];
            let path = self.snapshot.inner.filepath(file_id);

            let map = match map_readonly(&path) {
                Ok(map) => map,
                Err(e) => {
                    // The file may be mid-deletion; skip it silently.
                    log::trace!(
                        target: "galekv::engine",
                        "iterator: cannot map file {} ({}), skipping",
                        file_id,
                        e
                    );
                    state.index_file += 1;
                    continue;
                }
            };
            let index = match load_file(&map, file_id) {
                Ok(index) => index,
                Err(e) => {
                    log::warn!(
                        target: "galekv::engine",
                        "iterator: corrupt file {} ({}), skipping",
                        file_id,
                        e
                    );
                    state.index_file += 1;
                    continue;
                }
            };

            let mut offsets: Vec<u32> = index.entries.iter().map(|(_, offset)| *offset).collect();
            offsets.sort_unstable();

            state.offsets = offsets;
            state.index_loc = 0;
            state.current_file = file_id;
            state.has_file = true;
            return true;
        }
        false
    }

    /// The core advance loop: find the next location whose record is
    /// still the live one for its key.
    fn advance(&self, state: &mut IterState) -> bool {
        loop {
            if !state.has_file && !self.load_next_file(state) {
                state.is_valid = false;
                state.current = None;
                return false;
            }

            if state.index_loc >= state.offsets.len() {
                state.has_file = false;
                state.index_file += 1;
                continue;
            }

            let location = Location::sealed(state.current_file, state.offsets[state.index_loc]);
            state.index_loc += 1;

            let entry = match self.snapshot.inner.get_entry(&self.options, location) {
                Ok(entry) => entry,
                Err(e) => {
                    log::trace!(
                        target: "galekv::engine",
                        "iterator: unreadable record at {} ({}), skipping",
                        location,
                        e
                    );
                    continue;
                }
            };

            // Tombstones occupy locations but are never yielded.
            if entry.tombstone {
                continue;
            }

            // A record is live iff the index still resolves its key to
            // this exact location. An error here means the file is
            // disappearing under us: give up on the rest of it.
            let live = match self.snapshot.inner.live_location(&self.options, &entry.key) {
                Ok(live) => live,
                Err(e) => {
                    log::trace!(
                        target: "galekv::engine",
                        "iterator: lookup failed for record at {} ({}), skipping file",
                        location,
                        e
                    );
                    state.has_file = false;
                    state.index_file += 1;
                    continue;
                }
            };
            match live {
                Some(live) if live == location => {
                    state.current = Some(entry);
                    return true;
                }
                // Overwritten or deleted since this file was written.
                _ => continue,
            }
        }
    }
}

impl Iterate for StoreIterator {
    fn begin(&self) {
        let mut state = self.state.lock();
        *state = IterState {
            is_valid: true,
            ..IterState::default()
        };
        self.advance(&mut state);
    }

    fn is_valid(&self) -> bool {
        let state = self.state.lock();
        state.is_valid && state.current.is_some()
    }

    fn next(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_valid {
            return false;
        }
        self.advance(&mut state)
    }

    fn key(&self) -> Option<Vec<u8>> {
        self.state.lock().current.as_ref().map(|e| e.key.clone())
    }

    fn value(&self) -> Result<Option<Vec<u8>>> {
        let entry = match &self.state.lock().current {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        if !entry.compressed {
            return Ok(Some(entry.value));
        }
        let plain =
            MultipartReader::new(entry.value).read_all(entry.size_uncompressed as usize)?;
        Ok(Some(plain))
    }

    fn multipart_value(&self) -> Option<MultipartReader> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|entry| MultipartReader::new(entry.value.clone()))
    }
}
