//! The global key-hash → location index.

use hstable::Location;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Concurrent multimap from 64-bit key hash to record locations.
///
/// Single-writer, many-reader: probes take the shared lock, file
/// (de)registration takes the exclusive lock briefly.
///
/// Each per-hash list is kept monotone in file-id (and in offset within a
/// file), because files are only ever installed in ascending id order.
/// The live candidate is therefore always the *last* element, and a probe
/// walks the list backwards without sorting anything.
pub(crate) struct GlobalIndex {
    map: RwLock<HashMap<u64, Vec<Location>>>,
}

impl GlobalIndex {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Appends one file's entries, in the loader's scan order.
    pub fn insert_file(&self, file_id: u32, entries: &[(u64, u32)]) {
        let mut map = self.map.write();
        for (hash, offset) in entries {
            let location = Location::sealed(file_id, *offset);
            let list = map.entry(*hash).or_default();
            debug_assert!(
                list.last().map_or(true, |last| *last < location),
                "index insertion out of order"
            );
            list.push(location);
        }
    }

    #[cfg(test)]
    pub fn insert_location(&self, hash: u64, location: Location) {
        self.map.write().entry(hash).or_default().push(location);
    }

    /// All locations recorded for `hash`, oldest first. Empty when the
    /// hash is unknown.
    pub fn lookup(&self, hash: u64) -> Vec<Location> {
        self.map
            .read()
            .get(&hash)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Drops every location belonging to `file_id`.
    pub fn remove_file(&self, file_id: u32) {
        let mut map = self.map.write();
        map.retain(|_, list| {
            list.retain(|location| location.file_id() != file_id);
            !list.is_empty()
        });
    }

    /// Total number of locations indexed.
    pub fn len(&self) -> usize {
        self.map.read().values().map(Vec::len).sum()
    }
}
