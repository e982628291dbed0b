//! Core data models used throughout the vault index engine.
//!
//! These types are the units of work that flow through the request
//! protocol: documents ready for indexing, chunks, change events from
//! the host's file watcher, search queries/hits, and the portable
//! snapshot blobs used for export/import.
//!
//! All protocol-facing types serialize as camelCase JSON to match the
//! envelope shapes the host expects.

use serde::{Deserialize, Serialize};

/// Default embedding dimensionality when `init` does not specify one.
pub const DEFAULT_EMBEDDING_DIMS: usize = 768;

/// Document kind as reported by the host's readers.
///
/// The engine never parses source file formats itself; the kind only
/// selects per-kind behavior (graph extraction runs for markdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Markdown,
    Pdf,
    Docx,
    Text,
    Other,
}

impl DocumentKind {
    /// Whether documents of this kind feed the graph index.
    pub fn supports_graph(&self) -> bool {
        matches!(self, DocumentKind::Markdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Markdown => "markdown",
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "text",
            DocumentKind::Other => "other",
        }
    }

    /// Parse a stored kind string; unknown values fall back to `Other`.
    pub fn parse(s: &str) -> DocumentKind {
        match s {
            "markdown" => DocumentKind::Markdown,
            "pdf" => DocumentKind::Pdf,
            "docx" => DocumentKind::Docx,
            "text" => DocumentKind::Text,
            _ => DocumentKind::Other,
        }
    }
}

/// A document ready for indexing.
///
/// Produced externally (the host's readers extract plain text); consumed
/// by the engine as an opaque unit of indexing work. `path` is the
/// stable identifier across all stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexableDocument {
    pub path: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: String,
    /// Modification timestamp (Unix seconds). Authoritative value for
    /// reconciliation staleness checks.
    pub mtime: i64,
    /// Pre-computed document embedding of the configured dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A slice of a document's content.
///
/// A chunk without a `chunk_id` is a single, non-chunked unit (the
/// document was below the chunking threshold).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub doc_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    /// 0-based position within the document; contiguous and increasing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
}

/// Chunking engine tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    /// Maximum bytes per chunk window (edges snap to char boundaries).
    pub max_chunk_size: usize,
    /// Bytes shared between consecutive windows.
    pub chunk_overlap: usize,
    /// Documents at or below this size stay a single non-chunked unit.
    pub min_document_size_for_chunking: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            chunk_overlap: 200,
            min_document_size_for_chunking: 1500,
        }
    }
}

/// A change notification from the host's document store.
///
/// Closed tagged union so the update queue's debounce/merge logic is
/// exhaustively matched rather than duck-typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeEvent {
    Created { path: String },
    Modified { path: String },
    Deleted { path: String },
    Renamed { from: String, to: String },
}

/// Search mode for [`SearchQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fulltext,
    Vector,
    Hybrid,
}

/// A single search invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Query embedding; required (with the configured dimension) for
    /// vector and hybrid modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_limit() -> usize {
    10
}

/// A scored search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: f64,
}

/// Index status as reported by `get-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_built_at: Option<i64>,
    pub indexed_docs: i64,
    pub is_ready: bool,
}

/// A `{path, mtime}` pair from the relational store — the basis for
/// host-side reconciliation diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedPath {
    pub path: String,
    pub mtime: i64,
}

/// A recently-opened document joined with current metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDoc {
    pub path: String,
    /// Timestamp of last access (Unix seconds).
    pub ts: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DocumentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
}

/// The three exportable stores.
///
/// Wire names match the historical persistence format: `orama` is the
/// legacy tag for the text/vector snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    #[serde(rename = "sqlite")]
    Relational,
    #[serde(rename = "orama")]
    Text,
    #[serde(rename = "graph")]
    Graph,
}

impl StoreKind {
    /// All store kinds, in export order.
    pub const ALL: [StoreKind; 3] = [StoreKind::Relational, StoreKind::Text, StoreKind::Graph];
}

/// Portable snapshot blobs for export/import.
///
/// `sqlite` is base64-encoded database bytes; `orama` and `graph` are
/// JSON snapshot strings. Each blob is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageBlobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orama: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_kind_roundtrip() {
        for kind in [
            DocumentKind::Markdown,
            DocumentKind::Pdf,
            DocumentKind::Docx,
            DocumentKind::Text,
            DocumentKind::Other,
        ] {
            assert_eq!(DocumentKind::parse(kind.as_str()), kind);
        }
        assert_eq!(DocumentKind::parse("mystery"), DocumentKind::Other);
    }

    #[test]
    fn only_markdown_feeds_the_graph() {
        assert!(DocumentKind::Markdown.supports_graph());
        assert!(!DocumentKind::Pdf.supports_graph());
        assert!(!DocumentKind::Text.supports_graph());
    }

    #[test]
    fn indexable_document_uses_wire_field_names() {
        let doc: IndexableDocument = serde_json::from_value(serde_json::json!({
            "path": "notes/a.md",
            "title": "A",
            "type": "markdown",
            "content": "hello",
            "mtime": 100
        }))
        .unwrap();
        assert_eq!(doc.kind, DocumentKind::Markdown);
        assert!(doc.embedding.is_none());
    }

    #[test]
    fn change_event_is_tagged() {
        let ev: ChangeEvent = serde_json::from_value(serde_json::json!({
            "kind": "renamed", "from": "a.md", "to": "b.md"
        }))
        .unwrap();
        assert_eq!(
            ev,
            ChangeEvent::Renamed {
                from: "a.md".into(),
                to: "b.md".into()
            }
        );
    }

    #[test]
    fn store_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&StoreKind::Text).unwrap(),
            "\"orama\""
        );
        assert_eq!(
            serde_json::to_string(&StoreKind::Relational).unwrap(),
            "\"sqlite\""
        );
    }
}
