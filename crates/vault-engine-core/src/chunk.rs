//! Sliding-window text chunker.
//!
//! Splits long document content into overlapping windows so each chunk
//! can be embedded and retrieved independently. Documents at or below
//! `min_document_size_for_chunking` are returned as a single,
//! non-chunked unit (no chunk id, no index).
//!
//! # Algorithm
//!
//! Sizes are measured in bytes, with every window edge snapped to a
//! valid UTF-8 char boundary:
//!
//! 1. Window `max_chunk_size` bytes wide, end snapped back to a char
//!    boundary.
//! 2. Each subsequent window starts `chunk_overlap` bytes before the
//!    previous window ended (snapped, so the effective overlap can
//!    differ around multibyte chars; it is exactly `chunk_overlap` for
//!    ASCII text).
//! 3. Indices are contiguous from 0; concatenating chunk contents with
//!    the overlap discounted reconstructs the source.
//!
//! # Example
//!
//! ```rust
//! use vault_engine_core::chunk::chunk_document;
//! use vault_engine_core::models::ChunkingConfig;
//!
//! let chunks = chunk_document("notes/a.md", "short note", &ChunkingConfig::default());
//! assert_eq!(chunks.len(), 1);
//! assert!(chunks[0].chunk_id.is_none());
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, ChunkingConfig};

/// SHA-256 hex digest of document content, recorded in the relational
/// store and compared on equal-mtime collisions.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split a document's content into overlapping chunks.
///
/// # Guarantees
///
/// - Content at or below the chunking threshold yields exactly one
///   chunk with no `chunk_id`/`chunk_index`.
/// - Chunked output has contiguous indices `0..n-1` and deterministic
///   ids derived from the document id and index.
/// - Every window boundary is a valid UTF-8 char boundary, and every
///   window makes forward progress regardless of the configured sizes.
pub fn chunk_document(doc_id: &str, content: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
    if content.len() <= cfg.min_document_size_for_chunking {
        return vec![Chunk {
            doc_id: doc_id.to_string(),
            content: content.to_string(),
            embedding: None,
            chunk_id: None,
            chunk_index: None,
        }];
    }

    // Overlap must leave room for forward progress.
    let overlap = cfg.chunk_overlap.min(cfg.max_chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < content.len() {
        let mut end = snap_to_char_boundary(content, start + cfg.max_chunk_size);
        if end <= start {
            // Pathological multi-byte run; take at least one char.
            end = content[start..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start + i)
                .unwrap_or(content.len());
        }

        chunks.push(make_chunk(doc_id, index, &content[start..end]));
        index += 1;

        if end >= content.len() {
            break;
        }
        let next = snap_to_char_boundary(content, end - overlap);
        start = if next > start {
            next
        } else {
            // Overlap would stall the window; skip to the next char.
            next_char_boundary(content, start + 1)
        };
    }

    chunks
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the next valid UTF-8 char boundary.
fn next_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn make_chunk(doc_id: &str, index: i64, content: &str) -> Chunk {
    Chunk {
        doc_id: doc_id.to_string(),
        content: content.to_string(),
        embedding: None,
        chunk_id: Some(format!("{}#{}", doc_id, index)),
        chunk_index: Some(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize, overlap: usize, min: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_size: max,
            chunk_overlap: overlap,
            min_document_size_for_chunking: min,
        }
    }

    #[test]
    fn small_document_is_a_single_unchunked_unit() {
        let chunks = chunk_document("doc1", "Hello, world!", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert!(chunks[0].chunk_id.is_none());
        assert!(chunks[0].chunk_index.is_none());
    }

    #[test]
    fn empty_document_is_a_single_unit() {
        let chunks = chunk_document("doc1", "", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chunk_index.is_none());
    }

    #[test]
    fn indices_are_contiguous() {
        let text = "abcdefgh".repeat(500); // 4000 chars
        let chunks = chunk_document("doc1", &text, &cfg(1000, 200, 1500));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, Some(i as i64));
            assert_eq!(c.chunk_id.as_deref(), Some(format!("doc1#{}", i).as_str()));
        }
    }

    #[test]
    fn overlap_discounted_reconstructs_source() {
        let text: String = (0..4000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let overlap = 200;
        let chunks = chunk_document("doc1", &text, &cfg(1000, overlap, 1500));

        let mut rebuilt = chunks[0].content.clone();
        for c in &chunks[1..] {
            rebuilt.push_str(&c.content[overlap..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn windows_respect_max_size() {
        let text = "x".repeat(5000);
        let chunks = chunk_document("doc1", &text, &cfg(1000, 200, 1500));
        for c in &chunks {
            assert!(c.content.len() <= 1000);
        }
    }

    #[test]
    fn multibyte_content_splits_on_char_boundaries() {
        let text = "héllø wörld ".repeat(300);
        let chunks = chunk_document("doc1", &text, &cfg(100, 20, 50));
        for c in &chunks {
            assert!(!c.content.is_empty());
            // Would panic on construction if a boundary were invalid;
            // double-check the pieces are valid slices of the source.
            assert!(text.contains(&c.content));
        }
    }

    #[test]
    fn tiny_window_over_multibyte_content_makes_progress() {
        // A window smaller than one char used to stall the restart
        // computation on a non-boundary byte index.
        let text = "😀".repeat(500); // 4-byte chars, 2000 bytes
        let chunks = chunk_document("doc1", &text, &cfg(3, 2, 50));

        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(!c.content.is_empty());
        }
        // Each window degenerates to a single char with no effective
        // overlap, so plain concatenation reproduces the source.
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn overlap_snaps_around_multibyte_chars() {
        let text = "é".repeat(1000); // 2-byte chars
        let chunks = chunk_document("doc1", &text, &cfg(100, 21, 50));
        for c in &chunks {
            assert!(!c.content.is_empty());
            assert!(text.contains(&c.content));
        }
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let a = content_hash("apple banana");
        let b = content_hash("apple banana");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash("apple cherry"));
    }

    #[test]
    fn deterministic() {
        let text = "alpha beta gamma delta ".repeat(200);
        let a = chunk_document("doc1", &text, &cfg(500, 100, 100));
        let b = chunk_document("doc1", &text, &cfg(500, 100, 100));
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
            assert_eq!(x.chunk_id, y.chunk_id);
        }
    }
}
