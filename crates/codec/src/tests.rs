use super::*;

// -------------------- Helpers --------------------

fn sample(len: usize) -> Vec<u8> {
    // Compressible but not constant: repeating 251-byte phrase.
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn decode_all(codec: &mut Lz4Codec, stream: &[u8]) -> Vec<Vec<u8>> {
    let mut parts = Vec::new();
    loop {
        match codec.uncompress(stream).unwrap() {
            Step::Part(p) => parts.push(p),
            Step::Done => return parts,
        }
    }
}

// -------------------- Round trips --------------------

#[test]
fn roundtrip_single_buffer() {
    let mut codec = Lz4Codec::new();
    let plain = sample(4096);

    let frame = codec.compress(&plain).unwrap();
    assert!(frame.len() >= FRAME_HEADER_SIZE);
    assert_eq!(codec.bytes_written_compressed(), frame.len() as u64);

    let parts = decode_all(&mut codec, &frame);
    assert_eq!(parts, vec![plain]);
    assert_eq!(codec.bytes_read_compressed(), frame.len() as u64);
}

#[test]
fn roundtrip_minimum_size_buffer() {
    let mut codec = Lz4Codec::new();
    let plain = sample(MIN_COMPRESS_INPUT);
    let frame = codec.compress(&plain).unwrap();
    assert_eq!(decode_all(&mut codec, &frame), vec![plain]);
}

#[test]
fn roundtrip_incompressible_buffer() {
    // A short pseudo-random buffer that LZ4 cannot shrink still frames.
    let mut plain = Vec::with_capacity(512);
    let mut x: u32 = 0x2545_f491;
    for _ in 0..512 {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        plain.push(x as u8);
    }

    let mut codec = Lz4Codec::new();
    let frame = codec.compress(&plain).unwrap();
    assert_eq!(decode_all(&mut codec, &frame), vec![plain]);
}

#[test]
fn concatenated_frames_decode_in_order_then_done() {
    let mut codec = Lz4Codec::new();
    let buffers = vec![sample(100), sample(9000), sample(64), sample(65536)];

    let mut stream = Vec::new();
    for b in &buffers {
        stream.extend_from_slice(&codec.compress(b).unwrap());
    }
    assert_eq!(codec.bytes_written_compressed(), stream.len() as u64);

    let parts = decode_all(&mut codec, &stream);
    assert_eq!(parts, buffers);
    assert_eq!(codec.uncompress(&stream).unwrap(), Step::Done);
}

// -------------------- Small-input short circuit --------------------

#[test]
fn input_under_eight_bytes_yields_empty_output() {
    let mut codec = Lz4Codec::new();
    for len in 0..MIN_COMPRESS_INPUT {
        let out = codec.compress(&sample(len)).unwrap();
        assert!(out.is_empty());
    }
    assert_eq!(codec.bytes_written_compressed(), 0);
}

#[test]
fn empty_stream_is_immediately_done() {
    let mut codec = Lz4Codec::new();
    assert_eq!(codec.uncompress(&[]).unwrap(), Step::Done);
}

// -------------------- Reset --------------------

#[test]
fn reset_rewinds_both_cursors() {
    let mut codec = Lz4Codec::new();
    let plain = sample(1000);
    let frame = codec.compress(&plain).unwrap();
    let _ = decode_all(&mut codec, &frame);
    assert!(codec.bytes_written_compressed() > 0);
    assert!(codec.bytes_read_compressed() > 0);

    codec.reset();
    assert_eq!(codec.bytes_written_compressed(), 0);
    assert_eq!(codec.bytes_read_compressed(), 0);

    // The same stream decodes again from the start.
    assert_eq!(decode_all(&mut codec, &frame), vec![plain]);
}

// -------------------- Malformed streams --------------------

#[test]
fn truncated_header_is_rejected() {
    let mut codec = Lz4Codec::new();
    let err = codec.uncompress(&[1, 2, 3]).unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
    assert_eq!(codec.bytes_read_compressed(), 0);
}

#[test]
fn frame_running_past_stream_end_is_rejected() {
    let mut codec = Lz4Codec::new();
    let mut frame = codec.compress(&sample(256)).unwrap();
    // Inflate the declared compressed size beyond the actual stream.
    let bogus = (frame.len() as u32 + 100).to_le_bytes();
    frame[0..4].copy_from_slice(&bogus);

    codec.reset();
    let err = codec.uncompress(&frame).unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
    assert_eq!(codec.bytes_read_compressed(), 0);
}

#[test]
fn frame_smaller_than_header_is_rejected() {
    let mut codec = Lz4Codec::new();
    let mut stream = vec![0u8; 16];
    stream[0..4].copy_from_slice(&4u32.to_le_bytes()); // c < 8
    let err = codec.uncompress(&stream).unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
}

#[test]
fn corrupt_payload_fails_without_advancing() {
    let mut codec = Lz4Codec::new();
    let mut frame = codec.compress(&sample(4096)).unwrap();
    // Flip payload bytes after the header.
    for b in frame.iter_mut().skip(FRAME_HEADER_SIZE).take(16) {
        *b ^= 0xff;
    }

    codec.reset();
    let err = codec.uncompress(&frame).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decompress(_) | CodecError::Malformed(_)
    ));
    assert_eq!(codec.bytes_read_compressed(), 0);
}

#[test]
fn declared_sizes_include_the_header() {
    let mut codec = Lz4Codec::new();
    let plain = sample(300);
    let frame = codec.compress(&plain).unwrap();

    let compressed_size = u32::from_le_bytes(frame[0..4].try_into().unwrap()) as usize;
    let uncompressed_size = u32::from_le_bytes(frame[4..8].try_into().unwrap()) as usize;
    assert_eq!(compressed_size, frame.len());
    assert_eq!(uncompressed_size, plain.len());
}
