
use super::*;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Writes a standard file with `n` records `("key-i", "value-i")` and
/// returns the tempdir handle, the locations the writer reported, and the
/// sealed file's bytes.
pub fn build_standard_file(n: usize, file_id: u32) -> (TempDir, Vec<Location>, Vec<u8>) {
    let dir = tempdir().unwrap();
    let mut writer = HSTableWriter::create(dir.path(), file_id).unwrap();

    let mut locations = Vec::new();
    for i in 0..n {
        let key = format!("key-{:04}", i);
        let value = format!("value-{:04}", i);
        locations.push(writer.put(key.as_bytes(), value.as_bytes()).unwrap());
    }
    let path = writer.seal().unwrap();
    let bytes = std::fs::read(path).unwrap();
    (dir, locations, bytes)
}

pub fn read_file(dir: &Path, file_id: u32) -> Vec<u8> {
    std::fs::read(dir.join(filename(file_id))).unwrap()
}
