//! Hybrid search scoring over the [`TextIndex`].
//!
//! Three modes:
//!
//! - `fulltext` — BM25 keyword relevance (title boosted over content).
//! - `vector` — cosine similarity against stored document embeddings;
//!   requires a query embedding of the configured dimension.
//! - `hybrid` — runs both, deduplicates by document path, and combines
//!   raw scores as `0.6 × text + 0.4 × vector`. A document present in
//!   only one candidate set keeps only its weighted partial score.
//!
//! Results are sorted descending by score (path as tie-break) and
//! truncated to the requested limit. Vector/hybrid mode without an
//! embedding is a validation error, never a silent fallback.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{SearchHit, SearchMode, SearchQuery};
use crate::text_index::{ScoredDoc, TextIndex};

/// Weight applied to the full-text score in hybrid mode.
pub const TEXT_WEIGHT: f64 = 0.6;
/// Weight applied to the vector score in hybrid mode.
pub const VECTOR_WEIGHT: f64 = 0.4;

/// Run a search against the index. Read-only; no store mutation.
pub fn run_search(index: &TextIndex, query: &SearchQuery) -> Result<Vec<SearchHit>, EngineError> {
    let text_candidates = match query.mode {
        SearchMode::Fulltext | SearchMode::Hybrid => index.fulltext(&query.query, query.limit),
        SearchMode::Vector => Vec::new(),
    };

    let vector_candidates = match query.mode {
        SearchMode::Vector | SearchMode::Hybrid => {
            let embedding = query.embedding.as_deref().ok_or_else(|| {
                EngineError::Validation(format!(
                    "{} search requires a query embedding of dimension {}",
                    mode_name(query.mode),
                    index.dims()
                ))
            })?;
            index.vector(embedding, query.limit)?
        }
        SearchMode::Fulltext => Vec::new(),
    };

    let hits = match query.mode {
        SearchMode::Fulltext => into_hits(text_candidates),
        SearchMode::Vector => into_hits(vector_candidates),
        SearchMode::Hybrid => merge_hybrid(text_candidates, vector_candidates),
    };

    let mut hits = hits;
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    hits.truncate(query.limit);
    Ok(hits)
}

fn mode_name(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::Fulltext => "fulltext",
        SearchMode::Vector => "vector",
        SearchMode::Hybrid => "hybrid",
    }
}

fn into_hits(candidates: Vec<ScoredDoc>) -> Vec<SearchHit> {
    candidates
        .into_iter()
        .map(|c| SearchHit {
            path: c.path,
            title: c.title,
            score: c.score,
        })
        .collect()
}

/// Deduplicate by path and combine weighted partial scores.
fn merge_hybrid(text: Vec<ScoredDoc>, vector: Vec<ScoredDoc>) -> Vec<SearchHit> {
    struct Partial {
        title: String,
        text_score: f64,
        vector_score: f64,
    }

    let mut merged: HashMap<String, Partial> = HashMap::new();

    for c in text {
        merged.insert(
            c.path,
            Partial {
                title: c.title,
                text_score: c.score,
                vector_score: 0.0,
            },
        );
    }
    for c in vector {
        merged
            .entry(c.path)
            .and_modify(|p| p.vector_score = c.score)
            .or_insert(Partial {
                title: c.title,
                text_score: 0.0,
                vector_score: c.score,
            });
    }

    merged
        .into_iter()
        .map(|(path, p)| SearchHit {
            path,
            title: p.title,
            score: TEXT_WEIGHT * p.text_score + VECTOR_WEIGHT * p.vector_score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, IndexableDocument};

    fn doc(path: &str, content: &str, embedding: Option<Vec<f32>>) -> IndexableDocument {
        IndexableDocument {
            path: path.to_string(),
            title: path.to_string(),
            kind: DocumentKind::Markdown,
            content: content.to_string(),
            mtime: 100,
            embedding,
        }
    }

    fn query(mode: SearchMode, text: &str, embedding: Option<Vec<f32>>) -> SearchQuery {
        SearchQuery {
            query: text.to_string(),
            mode,
            limit: 10,
            embedding,
        }
    }

    #[test]
    fn fulltext_scenario_apple_banana() {
        let mut index = TextIndex::new(3);
        index.upsert(&doc("A", "apple banana", None)).unwrap();
        index.upsert(&doc("B", "banana cherry", None)).unwrap();

        let banana = run_search(&index, &query(SearchMode::Fulltext, "banana", None)).unwrap();
        let paths: Vec<&str> = banana.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(banana.len(), 2);
        assert!(paths.contains(&"A") && paths.contains(&"B"));

        let apple = run_search(&index, &query(SearchMode::Fulltext, "apple", None)).unwrap();
        assert_eq!(apple.len(), 1);
        assert_eq!(apple[0].path, "A");
    }

    #[test]
    fn vector_mode_without_embedding_is_validation_error() {
        let index = TextIndex::new(3);
        let err = run_search(&index, &query(SearchMode::Vector, "", None)).unwrap_err();
        assert_eq!(err.code(), "validation");

        let err = run_search(&index, &query(SearchMode::Hybrid, "x", None)).unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn wrong_dimension_embedding_is_validation_error() {
        let index = TextIndex::new(3);
        let err = run_search(
            &index,
            &query(SearchMode::Vector, "", Some(vec![1.0, 0.0])),
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn hybrid_partial_and_combined_scores() {
        let mut index = TextIndex::new(2);
        // Matches the text term only: embedding orthogonal to the query.
        index
            .upsert(&doc("text-only", "quorum raft", Some(vec![0.0, 1.0])))
            .unwrap();
        // Matches the embedding only.
        index
            .upsert(&doc("vector-only", "unrelated words", Some(vec![1.0, 0.0])))
            .unwrap();
        // Matches both.
        index
            .upsert(&doc("both", "quorum here", Some(vec![1.0, 0.0])))
            .unwrap();

        let text_hits =
            run_search(&index, &query(SearchMode::Fulltext, "quorum", None)).unwrap();
        let vec_hits = run_search(
            &index,
            &query(SearchMode::Vector, "", Some(vec![1.0, 0.0])),
        )
        .unwrap();
        let hybrid = run_search(
            &index,
            &query(SearchMode::Hybrid, "quorum", Some(vec![1.0, 0.0])),
        )
        .unwrap();

        let score = |hits: &[SearchHit], path: &str| {
            hits.iter().find(|h| h.path == path).map(|h| h.score)
        };

        let t = score(&text_hits, "text-only").unwrap();
        let v = score(&vec_hits, "vector-only").unwrap();
        let t_both = score(&text_hits, "both").unwrap();
        let v_both = score(&vec_hits, "both").unwrap();

        let h_text = score(&hybrid, "text-only").unwrap();
        let h_vec = score(&hybrid, "vector-only").unwrap();
        let h_both = score(&hybrid, "both").unwrap();

        assert!((h_text - TEXT_WEIGHT * t).abs() < 1e-9);
        assert!((h_vec - VECTOR_WEIGHT * v).abs() < 1e-9);
        assert!((h_both - (TEXT_WEIGHT * t_both + VECTOR_WEIGHT * v_both)).abs() < 1e-9);
    }

    #[test]
    fn hybrid_deduplicates_by_path() {
        let mut index = TextIndex::new(2);
        index
            .upsert(&doc("a", "quorum", Some(vec![1.0, 0.0])))
            .unwrap();

        let hits = run_search(
            &index,
            &query(SearchMode::Hybrid, "quorum", Some(vec![1.0, 0.0])),
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn results_truncate_to_limit() {
        let mut index = TextIndex::new(2);
        for i in 0..20 {
            index
                .upsert(&doc(&format!("d{i}"), "common term", None))
                .unwrap();
        }
        let mut q = query(SearchMode::Fulltext, "common", None);
        q.limit = 5;
        let hits = run_search(&index, &q).unwrap();
        assert_eq!(hits.len(), 5);
    }
}
