//! Streaming reassembly of compressed values.

use anyhow::{anyhow, bail, Result};
use codec::{CodecError, Lz4Codec, Step};

/// Walks the framed parts of a compressed value one at a time.
///
/// A compressed value is stored as a concatenation of independently
/// framed LZ4 blocks; this reader owns a codec whose read cursor threads
/// through them. Drive it with `begin` / `is_valid` / `next` and read
/// each plaintext block through `part`:
///
/// ```ignore
/// let mut reader = MultipartReader::new(entry.value.clone());
/// reader.begin();
/// while reader.is_valid() {
///     consume(reader.part().unwrap());
///     reader.next();
/// }
/// reader.status()?;
/// ```
///
/// A decode failure invalidates the reader; `status` reports it once
/// iteration stops.
pub struct MultipartReader {
    raw: Vec<u8>,
    codec: Lz4Codec,
    part: Option<Vec<u8>>,
    error: Option<CodecError>,
}

impl MultipartReader {
    /// Wraps the raw (still-compressed) value bytes.
    #[must_use]
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            raw,
            codec: Lz4Codec::new(),
            part: None,
            error: None,
        }
    }

    /// Rewinds to the first part and decodes it.
    pub fn begin(&mut self) {
        self.codec.reset();
        self.error = None;
        self.advance();
    }

    /// Whether a decoded part is currently held.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.part.is_some()
    }

    /// Advances to the next part; returns whether one is now held.
    pub fn next(&mut self) -> bool {
        self.advance()
    }

    /// The current plaintext part.
    #[must_use]
    pub fn part(&self) -> Option<&[u8]> {
        self.part.as_deref()
    }

    /// Ok once the stream finished cleanly; the decode error otherwise.
    pub fn status(&self) -> Result<()> {
        match &self.error {
            None => Ok(()),
            Some(e) => Err(anyhow!("multipart value decode failed: {}", e)),
        }
    }

    /// Concatenates every part, verifying the total against the declared
    /// plaintext length.
    ///
    /// # Errors
    ///
    /// Any decode failure, or a reassembled size that disagrees with
    /// `expected_len` — either way the value is unusable and the caller
    /// discards it.
    pub fn read_all(mut self, expected_len: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(expected_len);
        self.begin();
        while self.is_valid() {
            buffer.extend_from_slice(self.part().expect("is_valid held"));
            self.next();
        }
        self.status()?;
        if buffer.len() != expected_len {
            bail!(
                "multipart value reassembled to {} bytes, expected {}",
                buffer.len(),
                expected_len
            );
        }
        Ok(buffer)
    }

    fn advance(&mut self) -> bool {
        match self.codec.uncompress(&self.raw) {
            Ok(Step::Part(part)) => {
                self.part = Some(part);
                true
            }
            Ok(Step::Done) => {
                self.part = None;
                false
            }
            Err(e) => {
                self.error = Some(e);
                self.part = None;
                false
            }
        }
    }
}
