//! Refcounted read-only file mappings.

use memmap2::Mmap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One mapped data file. Derefs to its bytes.
pub(crate) struct MappedFile {
    pub file_id: u32,
    map: Mmap,
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// Maps a file read-only.
pub(crate) fn map_readonly(path: &Path) -> io::Result<Mmap> {
    let file = File::open(path)?;
    // Safety: the mapping is read-only and data files are sealed — the
    // write path never touches a file once its footer is down.
    unsafe { Mmap::map(&file) }
}

/// Cache of open mappings, keyed by file-id.
///
/// Readers hold mappings through `Arc`, so the refcount doubles as the
/// "file is in use" signal: a cached entry with outstanding clones must
/// not be unlinked. Reads with `fill_cache: false` bypass the cache and
/// drop their mapping when done.
pub(crate) struct FileMap {
    dir: PathBuf,
    cache: Mutex<HashMap<u32, Arc<MappedFile>>>,
}

impl FileMap {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Opens (or reuses) the mapping for `file_id`.
    pub fn open(&self, file_id: u32, fill_cache: bool) -> io::Result<Arc<MappedFile>> {
        if let Some(mapped) = self.cache.lock().get(&file_id) {
            return Ok(Arc::clone(mapped));
        }

        let path = self.dir.join(hstable::filename(file_id));
        let map = map_readonly(&path)?;
        let mapped = Arc::new(MappedFile { file_id, map });
        if fill_cache {
            self.cache
                .lock()
                .entry(file_id)
                .or_insert_with(|| Arc::clone(&mapped));
        }
        Ok(mapped)
    }

    /// Drops the cached mapping for `file_id` if nothing else holds it.
    ///
    /// Returns `false` while outstanding readers keep the mapping alive;
    /// the caller must not unlink the file in that case. Returns `true`
    /// when the entry was evicted or was never cached.
    pub fn evict_if_unreferenced(&self, file_id: u32) -> bool {
        let mut cache = self.cache.lock();
        match cache.get(&file_id) {
            None => true,
            Some(mapped) if Arc::strong_count(mapped) == 1 => {
                cache.remove(&file_id);
                true
            }
            Some(_) => false,
        }
    }

    #[cfg(test)]
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}
