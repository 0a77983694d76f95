use super::helpers::*;
use crate::MultipartReader;

#[test]
fn parts_stream_in_order() {
    let parts: Vec<&[u8]> = vec![b"first part bytes", b"second part bytes", b"third!!!"];
    let (raw, plain) = frame_parts(&parts);

    let mut reader = MultipartReader::new(raw);
    reader.begin();

    let mut seen = Vec::new();
    while reader.is_valid() {
        seen.push(reader.part().unwrap().to_vec());
        reader.next();
    }
    reader.status().unwrap();

    assert_eq!(seen.len(), 3);
    assert_eq!(seen.concat(), plain);
}

#[test]
fn read_all_reassembles_to_the_declared_size() {
    let parts: Vec<Vec<u8>> = (0..5).map(|i| noise(10_000, 100 + i)).collect();
    let part_refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
    let (raw, plain) = frame_parts(&part_refs);

    let reader = MultipartReader::new(raw);
    assert_eq!(reader.read_all(plain.len()).unwrap(), plain);
}

#[test]
fn read_all_rejects_a_size_disagreement() {
    let (raw, plain) = frame_parts(&[b"some payload here"]);
    let reader = MultipartReader::new(raw);
    assert!(reader.read_all(plain.len() + 1).is_err());
}

#[test]
fn empty_raw_value_finishes_immediately() {
    let mut reader = MultipartReader::new(Vec::new());
    reader.begin();
    assert!(!reader.is_valid());
    reader.status().unwrap();
}

#[test]
fn corrupt_frame_surfaces_through_status() {
    let (mut raw, _plain) = frame_parts(&[b"payload payload payload payload"]);
    // Shrink the declared plaintext size: the decompressor must refuse to
    // write past it.
    raw[4..8].copy_from_slice(&1u32.to_le_bytes());

    let mut reader = MultipartReader::new(raw);
    reader.begin();
    while reader.is_valid() {
        reader.next();
    }
    assert!(reader.status().is_err());
}

#[test]
fn begin_rewinds_to_the_first_part() {
    let (raw, _plain) = frame_parts(&[b"part one bytes", b"part two bytes"]);
    let mut reader = MultipartReader::new(raw);

    reader.begin();
    let first = reader.part().unwrap().to_vec();
    reader.next();
    assert!(reader.is_valid());

    reader.begin();
    assert_eq!(reader.part().unwrap(), first.as_slice());
}
