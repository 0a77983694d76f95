//! # Codec — Streaming LZ4 Block Compression
//!
//! Frames arbitrary byte buffers into a sequence of length-prefixed LZ4
//! blocks and decompresses such a sequence incrementally.
//!
//! Large values in GaleKV are stored as a concatenation of independently
//! compressed blocks. The write path calls [`Lz4Codec::compress`] once per
//! plaintext buffer and appends each returned frame; the read path calls
//! [`Lz4Codec::uncompress`] repeatedly against the stored bytes until it
//! reports [`Step::Done`]. The codec keeps two cursors so that both
//! directions are resumable across calls.
//!
//! ## Frame format
//!
//! ```text
//! [compressed_size: u32 LE][uncompressed_size: u32 LE][lz4 block bytes]
//! ```
//!
//! `compressed_size` includes the 8-byte frame header itself. All sizes are
//! bounded at `u32::MAX`; a buffer larger than that is rejected rather than
//! silently narrowed.

use lz4_flex::block::{self, CompressError, DecompressError};
use thiserror::Error;

/// Size of the frame header preceding every compressed block.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Buffers shorter than this are not worth framing: the 8-byte header could
/// exceed the payload. Callers are expected to coalesce such fragments.
pub const MIN_COMPRESS_INPUT: usize = 8;

/// Errors produced by [`Lz4Codec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input buffer cannot be described by the frame's 32-bit size field.
    #[error("input of {0} bytes exceeds the 4 GiB frame limit")]
    InputTooLarge(usize),

    /// The LZ4 compressor rejected the input.
    #[error("lz4 compression failed: {0}")]
    Compress(#[from] CompressError),

    /// The LZ4 decompressor rejected a frame payload.
    #[error("lz4 decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    /// A frame header declared sizes inconsistent with the stream.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

/// Result of one [`Lz4Codec::uncompress`] step.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// One decompressed block.
    Part(Vec<u8>),
    /// The read cursor reached the end of the stream. Not an error.
    Done,
}

/// Stateful streaming compressor/decompressor.
///
/// The two cursors advance independently: `bytes_written_compressed` across
/// [`compress`](Lz4Codec::compress) calls and `bytes_read_compressed` across
/// [`uncompress`](Lz4Codec::uncompress) calls, so a single codec instance can
/// be driven with successive buffers in either direction.
/// [`reset`](Lz4Codec::reset) is the only way to rewind.
#[derive(Debug, Default)]
pub struct Lz4Codec {
    bytes_written_compressed: u64,
    bytes_read_compressed: u64,
}

impl Lz4Codec {
    /// Creates a codec with both cursors at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total compressed bytes emitted so far, frame headers included.
    #[must_use]
    pub fn bytes_written_compressed(&self) -> u64 {
        self.bytes_written_compressed
    }

    /// Read cursor into the compressed stream passed to `uncompress`.
    #[must_use]
    pub fn bytes_read_compressed(&self) -> u64 {
        self.bytes_read_compressed
    }

    /// Returns both cursors to zero.
    pub fn reset(&mut self) {
        self.bytes_written_compressed = 0;
        self.bytes_read_compressed = 0;
    }

    /// Compresses `src` into a single framed block.
    ///
    /// Buffers shorter than [`MIN_COMPRESS_INPUT`] produce an empty result
    /// and do not advance the write cursor.
    ///
    /// # Errors
    ///
    /// [`CodecError::InputTooLarge`] if `src` exceeds `u32::MAX` bytes,
    /// [`CodecError::Compress`] if the LZ4 compressor fails.
    pub fn compress(&mut self, src: &[u8]) -> Result<Vec<u8>, CodecError> {
        if src.len() < MIN_COMPRESS_INPUT {
            return Ok(Vec::new());
        }
        if src.len() > u32::MAX as usize {
            return Err(CodecError::InputTooLarge(src.len()));
        }

        let bound = block::get_maximum_output_size(src.len());
        let mut dst = vec![0u8; FRAME_HEADER_SIZE + bound];
        let written = block::compress_into(src, &mut dst[FRAME_HEADER_SIZE..])?;
        let frame_size = FRAME_HEADER_SIZE + written;
        dst.truncate(frame_size);

        dst[0..4].copy_from_slice(&(frame_size as u32).to_le_bytes());
        dst[4..8].copy_from_slice(&(src.len() as u32).to_le_bytes());

        self.bytes_written_compressed += frame_size as u64;
        log::trace!(
            target: "galekv::codec",
            "compressed {} bytes into a {} byte frame (cursor {})",
            src.len(),
            frame_size,
            self.bytes_written_compressed
        );
        Ok(dst)
    }

    /// Decompresses the next frame of `src`, a contiguous sequence of frames.
    ///
    /// The read cursor selects the frame; it advances by the frame size on
    /// success. Returns [`Step::Done`] once the cursor reaches `src.len()`.
    ///
    /// Decompression is partial-safe: the payload read is bounded by the
    /// declared frame size and the output write by the declared uncompressed
    /// size. A frame whose declared sizes run past `src` is rejected without
    /// touching the payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] for inconsistent frame headers,
    /// [`CodecError::Decompress`] if the LZ4 decompressor fails. The cursor
    /// does not advance on error; the caller is expected to discard the
    /// value rather than retry.
    pub fn uncompress(&mut self, src: &[u8]) -> Result<Step, CodecError> {
        let cursor = usize::try_from(self.bytes_read_compressed)
            .map_err(|_| CodecError::Malformed("read cursor exceeds the address space"))?;
        if cursor == src.len() {
            return Ok(Step::Done);
        }
        if cursor > src.len() || src.len() - cursor < FRAME_HEADER_SIZE {
            return Err(CodecError::Malformed("frame header past end of stream"));
        }

        let compressed_size =
            u32::from_le_bytes(src[cursor..cursor + 4].try_into().unwrap()) as usize;
        let uncompressed_size =
            u32::from_le_bytes(src[cursor + 4..cursor + 8].try_into().unwrap()) as usize;

        if compressed_size < FRAME_HEADER_SIZE {
            return Err(CodecError::Malformed("frame smaller than its own header"));
        }
        if compressed_size > src.len() - cursor {
            return Err(CodecError::Malformed("frame runs past end of stream"));
        }

        let payload = &src[cursor + FRAME_HEADER_SIZE..cursor + compressed_size];
        let mut dst = vec![0u8; uncompressed_size];
        let written = block::decompress_into(payload, &mut dst)?;
        dst.truncate(written);

        self.bytes_read_compressed += compressed_size as u64;
        log::trace!(
            target: "galekv::codec",
            "uncompressed a {} byte frame into {} bytes (cursor {})",
            compressed_size,
            written,
            self.bytes_read_compressed
        );
        Ok(Step::Part(dst))
    }
}

#[cfg(test)]
mod tests;
