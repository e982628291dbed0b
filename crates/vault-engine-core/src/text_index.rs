//! In-memory full-text/vector document index.
//!
//! Documents are keyed by path. Full-text scoring is BM25 over a
//! per-document term-frequency table in which title tokens count double;
//! vector scoring is brute-force cosine similarity over per-document
//! embeddings of a fixed, configured dimension.
//!
//! The whole index serializes to a portable JSON snapshot for
//! export/import; restoring a snapshot reproduces identical scores.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{DocumentKind, IndexableDocument};

/// Weight multiplier for title tokens relative to content tokens.
const TITLE_BOOST: u32 = 2;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// A document as held by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDoc {
    pub path: String,
    pub title: String,
    pub kind: DocumentKind,
    pub mtime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Term -> weighted frequency (title tokens counted double).
    terms: HashMap<String, u32>,
    /// Total weighted token count.
    len: u32,
}

/// A scored document from one retrieval mode.
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub path: String,
    pub title: String,
    pub score: f64,
}

/// In-memory BM25 + cosine index, serializable to a JSON snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct TextIndex {
    dims: usize,
    docs: HashMap<String, IndexedDoc>,
}

impl TextIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            docs: HashMap::new(),
        }
    }

    /// Configured embedding dimensionality.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.docs.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&IndexedDoc> {
        self.docs.get(path)
    }

    /// Insert or replace the entry for `doc.path`.
    ///
    /// Re-indexing the same path never duplicates an entry. A document
    /// embedding with the wrong dimension is a validation error and
    /// leaves the index untouched.
    pub fn upsert(&mut self, doc: &IndexableDocument) -> Result<(), EngineError> {
        if let Some(emb) = &doc.embedding {
            if emb.len() != self.dims {
                return Err(EngineError::Validation(format!(
                    "embedding for '{}' has dimension {}, expected {}",
                    doc.path,
                    emb.len(),
                    self.dims
                )));
            }
        }

        let mut terms: HashMap<String, u32> = HashMap::new();
        let mut len = 0u32;
        for token in tokenize(&doc.title) {
            *terms.entry(token).or_insert(0) += TITLE_BOOST;
            len += TITLE_BOOST;
        }
        for token in tokenize(&doc.content) {
            *terms.entry(token).or_insert(0) += 1;
            len += 1;
        }

        self.docs.insert(
            doc.path.clone(),
            IndexedDoc {
                path: doc.path.clone(),
                title: doc.title.clone(),
                kind: doc.kind,
                mtime: doc.mtime,
                embedding: doc.embedding.clone(),
                terms,
                len,
            },
        );
        Ok(())
    }

    /// Remove the entry for `path`. Returns whether it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        self.docs.remove(path).is_some()
    }

    /// BM25 keyword search over titles and content.
    pub fn fulltext(&self, query: &str, limit: usize) -> Vec<ScoredDoc> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f64;
        let avg_len = self.docs.values().map(|d| d.len as f64).sum::<f64>() / n;

        // Document frequency per query term.
        let mut df: HashMap<&str, f64> = HashMap::new();
        for term in &query_terms {
            let count = self
                .docs
                .values()
                .filter(|d| d.terms.contains_key(term.as_str()))
                .count();
            df.insert(term.as_str(), count as f64);
        }

        let mut results: Vec<ScoredDoc> = Vec::new();
        for doc in self.docs.values() {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = *doc.terms.get(term.as_str()).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let n_t = df[term.as_str()];
                let idf = (((n - n_t + 0.5) / (n_t + 0.5)) + 1.0).ln();
                let denom =
                    tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc.len as f64 / avg_len.max(1.0));
                score += idf * tf * (BM25_K1 + 1.0) / denom;
            }
            if score > 0.0 {
                results.push(ScoredDoc {
                    path: doc.path.clone(),
                    title: doc.title.clone(),
                    score,
                });
            }
        }

        sort_and_truncate(&mut results, limit);
        results
    }

    /// Cosine-similarity search over stored document embeddings.
    ///
    /// The query vector must have the configured dimension.
    pub fn vector(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredDoc>, EngineError> {
        if query_vec.len() != self.dims {
            return Err(EngineError::Validation(format!(
                "query embedding has dimension {}, expected {}",
                query_vec.len(),
                self.dims
            )));
        }

        let mut results: Vec<ScoredDoc> = self
            .docs
            .values()
            .filter_map(|doc| {
                let emb = doc.embedding.as_ref()?;
                let sim = cosine_similarity(query_vec, emb) as f64;
                Some(ScoredDoc {
                    path: doc.path.clone(),
                    title: doc.title.clone(),
                    score: sim,
                })
            })
            .collect();

        sort_and_truncate(&mut results, limit);
        Ok(results)
    }

    /// Serialize the full index state to a portable JSON snapshot.
    pub fn to_snapshot(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Persistence(format!("text index snapshot encode: {e}")))
    }

    /// Restore an index from a snapshot produced by [`TextIndex::to_snapshot`].
    pub fn from_snapshot(snapshot: &str) -> Result<Self, EngineError> {
        serde_json::from_str(snapshot)
            .map_err(|e| EngineError::Persistence(format!("text index snapshot decode: {e}")))
    }
}

fn sort_and_truncate(results: &mut Vec<ScoredDoc>, limit: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    results.truncate(limit);
}

/// Lowercase alphanumeric tokenization.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, title: &str, content: &str) -> IndexableDocument {
        IndexableDocument {
            path: path.to_string(),
            title: title.to_string(),
            kind: DocumentKind::Markdown,
            content: content.to_string(),
            mtime: 100,
            embedding: None,
        }
    }

    fn doc_with_embedding(path: &str, content: &str, emb: Vec<f32>) -> IndexableDocument {
        IndexableDocument {
            embedding: Some(emb),
            ..doc(path, path, content)
        }
    }

    #[test]
    fn fulltext_matches_shared_and_unique_terms() {
        let mut index = TextIndex::new(3);
        index.upsert(&doc("a.md", "A", "apple banana")).unwrap();
        index.upsert(&doc("b.md", "B", "banana cherry")).unwrap();

        let both = index.fulltext("banana", 10);
        assert_eq!(both.len(), 2);

        let only_a = index.fulltext("apple", 10);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].path, "a.md");
    }

    #[test]
    fn title_match_outranks_content_match() {
        let mut index = TextIndex::new(3);
        index
            .upsert(&doc("title.md", "deployment guide", "misc words here"))
            .unwrap();
        index
            .upsert(&doc("body.md", "misc", "deployment mentioned in passing words"))
            .unwrap();

        let hits = index.fulltext("deployment", 10);
        assert_eq!(hits[0].path, "title.md");
    }

    #[test]
    fn upsert_twice_keeps_one_entry() {
        let mut index = TextIndex::new(3);
        let d = doc("a.md", "A", "apple banana");
        index.upsert(&d).unwrap();
        index.upsert(&d).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn wrong_dimension_embedding_is_validation_error() {
        let mut index = TextIndex::new(3);
        let err = index
            .upsert(&doc_with_embedding("a.md", "x", vec![1.0, 0.0]))
            .unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(index.is_empty());

        index
            .upsert(&doc_with_embedding("a.md", "x", vec![1.0, 0.0, 0.0]))
            .unwrap();
        let err = index.vector(&[1.0, 0.0], 10).unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn vector_search_ranks_by_cosine() {
        let mut index = TextIndex::new(3);
        index
            .upsert(&doc_with_embedding("near.md", "x", vec![1.0, 0.0, 0.0]))
            .unwrap();
        index
            .upsert(&doc_with_embedding("far.md", "y", vec![0.0, 1.0, 0.0]))
            .unwrap();
        index.upsert(&doc("plain.md", "z", "no embedding")).unwrap();

        let hits = index.vector(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "near.md");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score.abs() < 1e-6);
    }

    #[test]
    fn remove_then_search_finds_nothing() {
        let mut index = TextIndex::new(3);
        index.upsert(&doc("a.md", "A", "apple")).unwrap();
        assert!(index.remove("a.md"));
        assert!(!index.remove("a.md"));
        assert!(index.fulltext("apple", 10).is_empty());
    }

    #[test]
    fn snapshot_roundtrip_preserves_scores() {
        let mut index = TextIndex::new(3);
        index.upsert(&doc("a.md", "A", "apple banana")).unwrap();
        index
            .upsert(&doc_with_embedding("b.md", "banana cherry", vec![0.5, 0.5, 0.0]))
            .unwrap();

        let snapshot = index.to_snapshot().unwrap();
        let restored = TextIndex::from_snapshot(&snapshot).unwrap();

        assert_eq!(restored.dims(), 3);
        assert_eq!(restored.len(), 2);

        let before = index.fulltext("banana", 10);
        let after = restored.fulltext("banana", 10);
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(after.iter()) {
            assert_eq!(x.path, y.path);
            assert!((x.score - y.score).abs() < 1e-12);
        }
    }

    #[test]
    fn corrupt_snapshot_is_persistence_error() {
        let err = TextIndex::from_snapshot("not json").unwrap_err();
        assert_eq!(err.code(), "persistence");
    }
}
