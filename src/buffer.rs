//! Growable receive buffer for bytes that have not been framed yet.

use memchr::memmem;
use std::ops::Range;

/// Accumulates raw bytes read from a port until the framing engine consumes them.
#[derive(Debug, Default, Clone)]
pub struct ByteAccumulator {
    bytes: Vec<u8>,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the end of the buffer.
    pub fn append(&mut self, chunk: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(chunk);
        self
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Remove `range` from the buffer, shifting the remaining tail forward.
    ///
    /// The range is clamped to the buffered length so callers may pass an end
    /// computed from a partially received frame.
    pub fn clear_range(&mut self, range: Range<usize>) {
        let end = range.end.min(self.bytes.len());
        let start = range.start.min(end);
        self.bytes.drain(start..end);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the whole buffer, leaving it empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// First index of `needle` at or after `from`.
    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        if needle.is_empty() || from >= self.bytes.len() {
            return None;
        }
        memmem::find(&self.bytes[from..], needle).map(|idx| idx + from)
    }
}
