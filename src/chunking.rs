//! Document chunking for ingestion.
//!
//! Splits documents into bounded, overlapping chunks hierarchically:
//! paragraphs first, then sentences, then words, falling back to raw
//! character windows for pathological input. Matches the splitter used when
//! the corpus was first embedded (1000-character chunks, 200-character
//! overlap by default), so re-ingestion reproduces the same chunk ids.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::document::{Chunk, Document};

const SEPARATORS: &[&str] = &["\n\n", ". ", "! ", "? ", " "];

/// Splits documents into chunks sized for embedding.
///
/// Produced chunks carry no embedding; the pipeline attaches embeddings
/// during ingestion. Chunk ids are content-derived
/// (`{document_id}_{index}_{hash}`), so identical content always produces
/// identical ids.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a new splitter.
    ///
    /// `chunk_size` is the maximum characters per chunk; `chunk_overlap` is
    /// the number of trailing characters repeated at the start of the next
    /// chunk when a segment has to be cut mid-text.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Split a document into chunks. Returns an empty `Vec` for empty text.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let pieces = split_segments(&document.text, self.chunk_size, self.chunk_overlap, SEPARATORS);

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), index.to_string());
                Chunk {
                    id: chunk_id(&document.id, index, &text),
                    text,
                    embedding: Vec::new(),
                    metadata,
                    source: document.id.clone(),
                }
            })
            .collect()
    }
}

/// Stable, content-derived chunk id.
fn chunk_id(document_id: &str, index: usize, text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{document_id}_{index}_{:08x}", hasher.finish() as u32)
}

/// Split `text` at the first separator, merging segments back together while
/// they fit within `chunk_size`. Oversized segments recurse into the next
/// separator level; character windows are the last resort.
fn split_segments(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }
    let Some((separator, rest)) = separators.split_first() else {
        return char_windows(text, chunk_size, chunk_overlap);
    };

    let mut pieces = Vec::new();
    let mut current = String::new();

    for segment in split_keeping_separator(text, separator) {
        if current.is_empty() {
            current = segment.to_string();
        } else if char_len(&current) + char_len(segment) <= chunk_size {
            current.push_str(segment);
        } else {
            flush(&mut pieces, current, chunk_size, chunk_overlap, rest);
            current = segment.to_string();
        }
    }
    if !current.is_empty() {
        flush(&mut pieces, current, chunk_size, chunk_overlap, rest);
    }

    pieces
}

fn flush(
    pieces: &mut Vec<String>,
    segment: String,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) {
    if char_len(&segment) > chunk_size {
        pieces.extend(split_segments(&segment, chunk_size, chunk_overlap, separators));
    } else {
        pieces.push(segment);
    }
}

/// Split at a separator while keeping the separator attached to the
/// preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}

/// Raw character windows with overlap; UTF-8 safe.
fn char_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
