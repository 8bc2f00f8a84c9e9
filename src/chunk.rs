//! Overlapping fixed-size text chunker.
//!
//! Splits a document's extracted text into character-count chunks. After each
//! cut, the next chunk restarts `overlap` characters before the cut point, so
//! a concept spanning a boundary is not fully lost to either side.
//!
//! Each chunk inherits the page number of the text unit that contributed its
//! first character, so a chunk spanning a page break keeps the earliest page
//! it touches. Chunk indices are contiguous starting at 0, and chunking the
//! same input always yields the same boundaries.

use crate::error::{Error, Result};
use crate::models::{Chunk, TextUnit};

/// Split the loader's ordered text units into overlapping chunks.
///
/// `chunk_size` and `overlap` are character counts; `overlap < chunk_size`
/// is required and rejected up front. A document shorter than one chunk
/// produces exactly one chunk.
pub fn chunk_units(
    filename: &str,
    units: &[TextUnit],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk size must be > 0".into()));
    }
    if overlap >= chunk_size {
        return Err(Error::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }

    // Flatten to one char sequence, remembering where each unit starts.
    let mut chars: Vec<char> = Vec::new();
    let mut spans: Vec<(usize, Option<i64>)> = Vec::new();
    for unit in units {
        spans.push((chars.len(), unit.page));
        chars.extend(unit.text.chars());
    }

    if chars.is_empty() {
        return Ok(vec![Chunk {
            filename: filename.to_string(),
            page: units.first().and_then(|u| u.page),
            chunk_index: 0,
            text: String::new(),
        }]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(Chunk {
            filename: filename.to_string(),
            page: page_at(&spans, start),
            chunk_index: index,
            text: chars[start..end].iter().collect(),
        });
        index += 1;
        if end == chars.len() {
            break;
        }
        // overlap < chunk_size guarantees forward progress
        start = end - overlap;
    }

    Ok(chunks)
}

/// Page of the unit containing the character at `offset`.
fn page_at(spans: &[(usize, Option<i64>)], offset: usize) -> Option<i64> {
    let mut page = None;
    for (unit_start, unit_page) in spans {
        if *unit_start <= offset {
            page = *unit_page;
        } else {
            break;
        }
    }
    page
}
