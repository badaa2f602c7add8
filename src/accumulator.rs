//! Ordered accumulation of streamed audio chunks.

use bytes::{Bytes, BytesMut};

use crate::error::{TTSError, TTSResult};

/// Collects binary payloads in arrival order and assembles the final buffer.
///
/// Arrival order is temporal audio order, so chunks are never reordered,
/// merged, or dropped. Zero-length chunks are kept and count toward the
/// chunk total; a completion signal is what ends a stream, not payload size.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    chunks: Vec<Bytes>,
    total_len: usize,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one chunk. Amortized O(1).
    pub fn append(&mut self, chunk: Bytes) {
        self.total_len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Number of chunks appended so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total payload bytes appended so far.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// True when nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenates all chunks in arrival order.
    ///
    /// Fails with [`TTSError::EmptyResult`] when no chunk was ever appended;
    /// a stream that produced nothing is an error, not empty audio.
    pub fn assemble(self) -> TTSResult<Bytes> {
        if self.chunks.is_empty() {
            return Err(TTSError::EmptyResult);
        }
        if self.chunks.len() == 1 {
            // Single chunk needs no copy.
            return Ok(self.chunks.into_iter().next().unwrap_or_default());
        }
        let mut buf = BytesMut::with_capacity(self.total_len);
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        Ok(buf.freeze())
    }
}
