//! # Engine - GaleKV Storage Core
//!
//! The read facade over a GaleKV database directory: it owns the global
//! key→location index, serves point lookups, hands out snapshots, and
//! drives iteration across the sealed [`hstable`] data files.
//!
//! ## Architecture
//!
//! ```text
//! Client reads
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                   ENGINE                         │
//! │                                                  │
//! │ open()  → LOCK, options.kdb, discover *.kdb,     │
//! │           reindex each file on the task pool,    │
//! │           merge into the global index            │
//! │                                                  │
//! │ read.rs → get() / get_entry() / filepath()       │
//! │            index probe, newest file wins,        │
//! │            hash collisions fall back             │
//! │                                                  │
//! │ snapshot.rs → frozen file-id list, pins files    │
//! │ iterator.rs → walks live records per snapshot    │
//! │ multipart.rs → streams compressed value parts    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | [`lib.rs`]     | `Engine` struct, open/recovery, file removal       |
//! | [`index`]      | concurrent key-hash → location multimap            |
//! | [`files`]      | refcounted file mappings                           |
//! | [`read`]       | `get()`, `get_entry()`, `filepath()`               |
//! | [`snapshot`]   | frozen file-id lists with deletion pins            |
//! | [`iterator`]   | the `Iterate` trait and its snapshot walker        |
//! | [`multipart`]  | streaming reassembly of compressed values          |
//!
//! ## Concurrency
//!
//! All read paths take `&self`: the index sits behind a single-writer
//! many-reader lock, file mappings are shared through `Arc`, and each
//! iterator serializes its own calls internally. Writes to the directory
//! (sealing new files, compaction deletes) happen on external threads and
//! talk to the engine only through `install_file` / `remove_file`.

mod files;
mod index;
mod iterator;
mod multipart;
mod read;
mod snapshot;

pub use iterator::{Iterate, StoreIterator};
pub use multipart::MultipartReader;
pub use read::Entry;
pub use snapshot::Snapshot;

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{OptionsFile, ReadOptions, StoreOptions, LOCK_FILENAME, OPTIONS_FILENAME};
use files::FileMap;
use hstable::{load_file, FileIndex, DATA_FILE_EXT};
use index::GlobalIndex;
use taskpool::TaskPool;

/// The storage engine: a read facade over one database directory.
///
/// Cheap to clone through [`snapshot`](Engine::snapshot) handles; the
/// underlying state is shared and internally synchronized, so `&self`
/// methods may be called from any number of threads.
pub struct Engine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    dir: PathBuf,
    #[allow(dead_code)]
    options_file: OptionsFile,
    pub(crate) index: GlobalIndex,
    pub(crate) files: FileMap,
    /// Sorted list of sealed file-ids currently part of the store.
    sealed: RwLock<Vec<u32>>,
    /// Snapshot pins per file-id. A pinned file must not be unlinked.
    pins: Mutex<HashMap<u32, u32>>,
    /// Held for the life of the engine; the OS releases it on drop.
    _lock: File,
}

/// One reindexing unit for the open-time task pool.
struct IndexFileTask {
    path: PathBuf,
    file_id: u32,
    results: Arc<Mutex<Vec<(u32, FileIndex)>>>,
}

impl taskpool::Task for IndexFileTask {
    fn run_in_lock(&mut self, worker_id: usize) {
        log::trace!(
            target: "galekv::engine",
            "worker {} picked up file {}",
            worker_id,
            self.file_id
        );
    }

    fn run(&mut self, _worker_id: usize, _task_id: u64) {
        let index = match files::map_readonly(&self.path) {
            Ok(map) => match load_file(&map, self.file_id) {
                Ok(index) => index,
                Err(e) => {
                    log::warn!(
                        target: "galekv::engine",
                        "skipping unreadable file {}: {}",
                        self.path.display(),
                        e
                    );
                    return;
                }
            },
            Err(e) => {
                log::warn!(
                    target: "galekv::engine",
                    "skipping unmappable file {}: {}",
                    self.path.display(),
                    e
                );
                return;
            }
        };
        self.results.lock().push((self.file_id, index));
    }
}

impl Engine {
    /// Opens a database directory, creating it if absent.
    ///
    /// Takes the exclusive `LOCK`, writes or verifies `options.kdb`, then
    /// discovers the `*.kdb` data files and reindexes each on a worker
    /// pool, merging the per-file indexes into the global index in
    /// ascending file-id order. Files that fail header validation (or
    /// whose filename disagrees with their header id) are skipped with a
    /// warning — discovery is best-effort, matching crash recovery.
    ///
    /// # Errors
    ///
    /// Fails when the directory is locked by another process, when
    /// `options.kdb` records a format this build does not read, or on
    /// I/O errors against the directory itself.
    pub fn open<P: AsRef<Path>>(dir: P, options: StoreOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(dir.join(LOCK_FILENAME))?;
        lock.try_lock_exclusive()
            .with_context(|| format!("database at {} is locked by another process", dir.display()))?;

        let options_file = load_or_create_options(&dir, &options)?;

        let data_files = discover_data_files(&dir)?;
        let results = Arc::new(Mutex::new(Vec::new()));
        if !data_files.is_empty() {
            let workers = std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
                .min(data_files.len());
            let mut pool = TaskPool::start(workers, data_files.len());
            for (file_id, path) in &data_files {
                pool.submit(Box::new(IndexFileTask {
                    path: path.clone(),
                    file_id: *file_id,
                    results: Arc::clone(&results),
                }))
                .expect("pool accepts tasks before shutdown");
            }
            pool.shutdown();
        }

        let mut indexed = Arc::try_unwrap(results)
            .expect("pool workers joined")
            .into_inner();
        indexed.sort_by_key(|(file_id, _)| *file_id);

        let index = GlobalIndex::new();
        let mut sealed = Vec::with_capacity(indexed.len());
        for (file_id, file_index) in &indexed {
            index.insert_file(*file_id, &file_index.entries);
            sealed.push(*file_id);
        }

        log::debug!(
            target: "galekv::engine",
            "opened {} with {} data files, {} index entries",
            dir.display(),
            sealed.len(),
            index.len()
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                files: FileMap::new(dir.clone()),
                dir,
                options_file,
                index,
                sealed: RwLock::new(sealed),
                pins: Mutex::new(HashMap::new()),
                _lock: lock,
            }),
        })
    }

    /// Registers a freshly sealed file: reindexes it and appends its
    /// entries to the global index. The write path calls this after
    /// `HSTableWriter::seal`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be mapped or fails header validation,
    /// or when `file_id` does not exceed every installed id (file-ids are
    /// never reused and the index relies on monotone insertion).
    pub fn install_file(&self, file_id: u32) -> Result<()> {
        let mut sealed = self.inner.sealed.write();
        if sealed.last().is_some_and(|last| *last >= file_id) {
            bail!("file id {} is not above the installed ids", file_id);
        }

        let path = self.inner.filepath(file_id);
        let map = files::map_readonly(&path)
            .with_context(|| format!("mapping {}", path.display()))?;
        let file_index = load_file(&map, file_id)?;
        self.inner.index.insert_file(file_id, &file_index.entries);
        sealed.push(file_id);

        log::debug!(
            target: "galekv::engine",
            "installed file {} with {} records",
            file_id,
            file_index.entries.len()
        );
        Ok(())
    }

    /// Unlinks a data file and purges its index entries, refusing while
    /// any snapshot pins it or a reader still holds its mapping.
    ///
    /// Returns `true` when the file was removed. This is the compaction
    /// contract: space is reclaimed only once no snapshot can reach the
    /// file.
    ///
    /// # Errors
    ///
    /// I/O failure while unlinking.
    pub fn remove_file(&self, file_id: u32) -> Result<bool> {
        if self.inner.pins.lock().get(&file_id).copied().unwrap_or(0) > 0 {
            log::debug!(target: "galekv::engine", "file {} is pinned, not removing", file_id);
            return Ok(false);
        }
        if !self.inner.files.evict_if_unreferenced(file_id) {
            log::debug!(target: "galekv::engine", "file {} is mapped, not removing", file_id);
            return Ok(false);
        }

        self.inner.index.remove_file(file_id);
        self.inner.sealed.write().retain(|id| *id != file_id);
        std::fs::remove_file(self.inner.filepath(file_id))?;
        log::debug!(target: "galekv::engine", "removed file {}", file_id);
        Ok(true)
    }

    /// Resolves a file-id to its path within the database directory.
    #[must_use]
    pub fn filepath(&self, file_id: u32) -> PathBuf {
        self.inner.filepath(file_id)
    }

    /// Point lookup. See [`EngineInner::get`] via the `read` module.
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<(Entry, hstable::Location)>> {
        self.inner.get(options, key)
    }

    /// Fetches the record at a sealed location.
    pub fn get_entry(&self, options: &ReadOptions, location: hstable::Location) -> Result<Entry> {
        self.inner.get_entry(options, location)
    }

    /// Freezes the current sealed file list and pins those files against
    /// deletion until the snapshot is dropped.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let file_ids = self.inner.sealed.read().clone();
        {
            let mut pins = self.inner.pins.lock();
            for id in &file_ids {
                *pins.entry(*id).or_insert(0) += 1;
            }
        }
        log::trace!(
            target: "galekv::engine",
            "snapshot over {} files",
            file_ids.len()
        );
        Snapshot::new(Arc::clone(&self.inner), file_ids)
    }

    /// Number of sealed files currently part of the store.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.inner.sealed.read().len()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.inner.dir)
            .field("files", &self.inner.sealed.read().len())
            .field("index_entries", &self.inner.index.len())
            .finish()
    }
}

impl EngineInner {
    pub(crate) fn filepath(&self, file_id: u32) -> PathBuf {
        self.dir.join(hstable::filename(file_id))
    }

    pub(crate) fn unpin(&self, file_ids: &[u32]) {
        let mut pins = self.pins.lock();
        for id in file_ids {
            if let Some(count) = pins.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    pins.remove(id);
                }
            }
        }
    }
}

fn load_or_create_options(dir: &Path, options: &StoreOptions) -> Result<OptionsFile> {
    let path = dir.join(OPTIONS_FILENAME);
    if path.exists() {
        let bytes = std::fs::read(&path)?;
        let decoded = OptionsFile::decode(&bytes)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(decoded);
    }

    // First open: record the format identity, atomically.
    let file = OptionsFile::for_store(options);
    let tmp = path.with_extension("kdb.tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&file.encode())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, &path)?;
    Ok(file)
}

fn discover_data_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != DATA_FILE_EXT) {
            continue;
        }
        // Data files are named by their zero-padded id; everything else
        // with the extension (options.kdb) falls out of the parse.
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(file_id) = stem.parse::<u32>() else {
            continue;
        };
        found.push((file_id, path));
    }
    found.sort_by_key(|(file_id, _)| *file_id);
    Ok(found)
}

#[cfg(test)]
mod tests;
