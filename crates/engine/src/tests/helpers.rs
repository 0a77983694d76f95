use codec::Lz4Codec;
use config::StoreOptions;
use hstable::{HSTableWriter, Location, FLAG_COMPRESSED, FLAG_MULTIPART};
use std::path::Path;

use crate::Engine;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn open(dir: &Path) -> Engine {
    init_logging();
    Engine::open(dir, StoreOptions::default()).unwrap()
}

/// Seals one standard file. `None` values become tombstones.
pub fn write_file(
    dir: &Path,
    file_id: u32,
    records: &[(&[u8], Option<&[u8]>)],
) -> Vec<Location> {
    let mut writer = HSTableWriter::create(dir, file_id).unwrap();
    let mut locations = Vec::new();
    for (key, value) in records {
        let location = match value {
            Some(value) => writer.put(key, value).unwrap(),
            None => writer.delete(key).unwrap(),
        };
        locations.push(location);
    }
    writer.seal().unwrap();
    locations
}

/// Frames `parts` through a fresh codec and returns the raw stored bytes
/// together with the concatenated plaintext.
pub fn frame_parts(parts: &[&[u8]]) -> (Vec<u8>, Vec<u8>) {
    let mut codec = Lz4Codec::new();
    let mut raw = Vec::new();
    let mut plain = Vec::new();
    for part in parts {
        raw.extend_from_slice(&codec.compress(part).unwrap());
        plain.extend_from_slice(part);
    }
    (raw, plain)
}

/// Seals one file holding compressed multipart records. Returns the
/// locations and the plaintext each record should reassemble to.
pub fn write_compressed_file(
    dir: &Path,
    file_id: u32,
    records: &[(&[u8], Vec<Vec<u8>>)],
) -> Vec<(Location, Vec<u8>)> {
    let mut writer = HSTableWriter::create(dir, file_id).unwrap();
    let mut out = Vec::new();
    for (key, parts) in records {
        let part_refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        let (raw, plain) = frame_parts(&part_refs);
        let location = writer
            .append(
                FLAG_COMPRESSED | FLAG_MULTIPART,
                key,
                &raw,
                plain.len() as u32,
            )
            .unwrap();
        out.push((location, plain));
    }
    writer.seal().unwrap();
    out
}

/// A deterministic pseudo-random buffer (xorshift) for value payloads.
pub fn noise(len: usize, mut seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        out.push(seed as u8);
    }
    out
}
