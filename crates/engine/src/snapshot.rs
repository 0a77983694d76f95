//! Snapshots: frozen file-id lists with deletion pins.

use config::ReadOptions;
use std::sync::Arc;

use crate::iterator::StoreIterator;
use crate::EngineInner;

/// A frozen view of the store: the sorted list of file-ids that were
/// sealed when the snapshot was taken.
///
/// Each listed file is pinned against `remove_file` until the snapshot
/// drops. Writes sealed after the snapshot began are invisible to it.
pub struct Snapshot {
    pub(crate) inner: Arc<EngineInner>,
    file_ids: Vec<u32>,
}

impl Snapshot {
    pub(crate) fn new(inner: Arc<EngineInner>, file_ids: Vec<u32>) -> Self {
        Self { inner, file_ids }
    }

    /// The frozen, ascending file-id list.
    #[must_use]
    pub fn file_ids(&self) -> &[u32] {
        &self.file_ids
    }

    /// Consumes the snapshot into an iterator over its live records.
    ///
    /// The iterator owns the snapshot, so the pins live exactly as long
    /// as the iteration can still touch the files.
    #[must_use]
    pub fn iterate(self, options: ReadOptions) -> StoreIterator {
        StoreIterator::new(self, options)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.inner.unpin(&self.file_ids);
        log::trace!(
            target: "galekv::engine",
            "snapshot over {} files released",
            self.file_ids.len()
        );
    }
}
