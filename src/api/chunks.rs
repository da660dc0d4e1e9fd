//! Splitting oversized content across several chunk documents and joining it back.
//!
//! A slide body is serialized to JSON; when that exceeds the per-document limit it is cut
//! on UTF-8 character boundaries and stored as numbered chunks next to a header document.

use super::{StoreError, StoreErrorKind};
use serde::{Deserialize, Serialize};

/// Per-document budget, kept below the store's 1 MiB document limit.
pub(crate) const DEFAULT_CHUNK_MAX_BYTES: usize = 900_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EncodedContent {
    Inline(Option<Vec<String>>),
    Chunked(Vec<String>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ContentChunk {
    pub index: usize,
    pub data: String,
}

pub(crate) fn encode_content(
    content: Option<&[String]>,
    max_bytes: usize,
) -> Result<EncodedContent, StoreError> {
    let serialized =
        serde_json::to_string(&content).map_err(|e| StoreError::invalid(e.to_string()))?;
    if serialized.len() <= max_bytes {
        return Ok(EncodedContent::Inline(content.map(<[String]>::to_vec)));
    }
    Ok(EncodedContent::Chunked(split_utf8(&serialized, max_bytes)?))
}

/// Cut `input` into pieces of at most `max_bytes` bytes without splitting a character.
pub(crate) fn split_utf8(input: &str, max_bytes: usize) -> Result<Vec<String>, StoreError> {
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < input.len() {
        let mut end = (start + max_bytes).min(input.len());
        while end > start && !input.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            return Err(StoreError::invalid(format!(
                "chunk size {max_bytes} is smaller than one character"
            )));
        }
        chunks.push(input[start..end].to_string());
        start = end;
    }

    Ok(chunks)
}

/// Join chunks by index and parse the content they carry.
pub(crate) fn decode_chunks(
    mut chunks: Vec<ContentChunk>,
    expected: Option<usize>,
) -> Result<Option<Vec<String>>, StoreError> {
    chunks.sort_by_key(|c| c.index);
    if let Some(expected) = expected {
        if chunks.len() < expected {
            return Err(StoreError::new(
                StoreErrorKind::Malformed,
                format!("expected {expected} chunks, found {}", chunks.len()),
            ));
        }
        chunks.truncate(expected);
    }

    let serialized: String = chunks.into_iter().map(|c| c.data).collect();
    serde_json::from_str(&serialized).map_err(StoreError::malformed)
}
