//! Request-size bounded chunking of text lists.
//!
//! The engine caps both the number of texts and the byte size of one call.
//! [`split`] partitions the input into contiguous ranges honouring both
//! caps; [`reassemble`] concatenates per-chunk results back in order.

use std::ops::Range;

/// Maximum number of texts per engine call
pub const DEEPL_MAX_TEXTS: usize = 50;

/// Rough maximum request body size per engine call
pub const DEEPL_MAX_REQUEST_BYTES: usize = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_texts: usize,
    pub max_bytes: usize,
}

impl ChunkLimits {
    pub fn new(max_texts: usize, max_bytes: usize) -> Self {
        Self {
            max_texts,
            max_bytes,
        }
    }

    pub fn deepl() -> Self {
        Self::new(DEEPL_MAX_TEXTS, DEEPL_MAX_REQUEST_BYTES)
    }
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self::deepl()
    }
}

/// Split `texts` greedily into chunk ranges.
///
/// A chunk is closed when the next text would exceed either bound. A text
/// larger than `max_bytes` on its own still forms a (single-text) chunk;
/// texts are never split.
pub fn split<T: AsRef<str>>(texts: &[T], limits: ChunkLimits) -> Vec<Range<usize>> {
    let max_texts = limits.max_texts.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;

    for (i, text) in texts.iter().enumerate() {
        let size = text.as_ref().len();
        let count = i - start;
        if count > 0 && (count + 1 > max_texts || bytes + size > limits.max_bytes) {
            chunks.push(start..i);
            start = i;
            bytes = 0;
        }
        bytes += size;
    }

    if start < texts.len() {
        chunks.push(start..texts.len());
    }
    chunks
}

/// Concatenate per-chunk results in chunk order.
pub fn reassemble(results: Vec<Vec<String>>) -> Vec<String> {
    results.into_iter().flatten().collect()
}
