//! Request handlers — one function per supported operation.
//!
//! Each handler is a function of `(context, payload) -> result`,
//! orchestrating the relational repos, the text/vector index, and the
//! graph. Handlers never encode envelopes; the protocol router owns
//! that. Per-document failures inside a batch are logged and skipped —
//! one bad document never rolls back the rest of the batch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vault_engine_core::chunk::{chunk_document, content_hash};
use vault_engine_core::error::EngineError;
use vault_engine_core::models::{
    Chunk, ChunkingConfig, IndexStatus, IndexableDocument, IndexedPath, RecentDoc, SearchHit,
    SearchQuery, StorageBlobs, StoreKind,
};
use vault_engine_core::search::run_search;

use crate::context::EngineContext;
use crate::repos::{KEY_INDEXED_DOCS, KEY_INDEX_BUILT_AT};

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

// ───────────────────────── init ─────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitParams {
    pub vault_id: String,
    /// Prior snapshots to restore; each blob independently optional.
    #[serde(default)]
    pub storage: Option<StorageBlobs>,
    #[serde(default)]
    pub embedding_dims: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub vault_id: String,
    /// Which stores were restored from snapshots.
    pub restored: Vec<StoreKind>,
}

/// Restore all three stores from optional snapshots or create empty
/// ones. Idempotent per engine instance: a second call re-binds the
/// vault id but does not duplicate store construction.
pub async fn init(ctx: &mut EngineContext, params: InitParams) -> anyhow::Result<InitResult> {
    if let Some(dims) = params.embedding_dims {
        ctx.set_embedding_dims(dims);
    }

    let mut restored = Vec::new();
    let storage = params.storage.unwrap_or_default();

    let sqlite_bytes = match &storage.sqlite {
        Some(b64) => Some(BASE64.decode(b64).map_err(|e| {
            EngineError::Persistence(format!("sqlite snapshot is not valid base64: {e}"))
        })?),
        None => None,
    };
    if sqlite_bytes.is_some() {
        restored.push(StoreKind::Relational);
    }
    ctx.init_database(sqlite_bytes.as_deref()).await?;
    ctx.init_repos()?;

    if let Some(snapshot) = &storage.orama {
        ctx.restore_text_index(snapshot)?;
        restored.push(StoreKind::Text);
    }
    if let Some(snapshot) = &storage.graph {
        ctx.restore_graph(snapshot)?;
        restored.push(StoreKind::Graph);
    }

    ctx.set_vault_id(params.vault_id.clone());
    info!(vault_id = %params.vault_id, restored = restored.len(), "engine initialized");
    Ok(InitResult {
        vault_id: params.vault_id,
        restored,
    })
}

// ─────────────────────── indexing ───────────────────────

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub docs: Vec<IndexableDocument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    pub indexed: usize,
    /// Documents dropped from the batch (e.g. bad embedding dimension).
    pub skipped: usize,
}

/// Upsert a batch of documents across the three stores.
///
/// Per document: text/vector index under its path, metadata record,
/// graph extraction for kinds that support it, then counters. Empty
/// input is a no-op, not an error.
pub async fn index_documents(
    ctx: &mut EngineContext,
    params: IndexParams,
) -> anyhow::Result<IndexResult> {
    if params.docs.is_empty() {
        return Ok(IndexResult {
            indexed: 0,
            skipped: 0,
        });
    }

    let now = now_ts();
    let mut indexed = 0usize;
    let mut skipped = 0usize;

    for doc in &params.docs {
        if let Err(err) = ctx.text_index().upsert(doc) {
            warn!(path = %doc.path, %err, "skipping document");
            skipped += 1;
            continue;
        }

        let hash = content_hash(&doc.content);
        ctx.doc_meta()?.upsert(doc, &hash, now).await?;

        if doc.kind.supports_graph() {
            ctx.graph().upsert_markdown_document(&doc.path, &doc.content);
        }

        indexed += 1;
    }

    if indexed > 0 {
        let state = ctx.index_state()?;
        state
            .set_if_unset(KEY_INDEX_BUILT_AT, &now.to_string())
            .await?;
        state.increment(KEY_INDEXED_DOCS, indexed as i64).await?;
        ctx.mark_ready();
    }

    debug!(indexed, skipped, "index batch complete");
    Ok(IndexResult { indexed, skipped })
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: usize,
}

/// Remove documents from the text/vector index, metadata, recent-open
/// records, and graph, in that order. A path absent from one store is
/// silently skipped in that store.
pub async fn delete_documents(
    ctx: &mut EngineContext,
    params: DeleteParams,
) -> anyhow::Result<DeleteResult> {
    let mut deleted = 0usize;
    for path in &params.paths {
        let in_text = ctx.text_index().remove(path);
        let in_meta = ctx.doc_meta()?.delete(path).await?;
        ctx.recent_open()?.delete(path).await?;
        let in_graph = ctx.graph().remove_file(path);
        if in_text || in_meta || in_graph {
            deleted += 1;
        }
    }
    debug!(requested = params.paths.len(), deleted, "delete complete");
    Ok(DeleteResult { deleted })
}

// ──────────────────────── queries ───────────────────────

/// Delegate to the hybrid search scorer. Read-only.
pub async fn search(
    ctx: &mut EngineContext,
    query: SearchQuery,
) -> anyhow::Result<Vec<SearchHit>> {
    let hits = run_search(ctx.text_index(), &query)?;
    Ok(hits)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeParams {
    pub doc_id: String,
    pub content: String,
    #[serde(default)]
    pub max_chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResult {
    pub chunks: Vec<Chunk>,
}

/// Prepare document content for downstream LLM analysis by splitting it
/// into bounded, overlapping chunks. The engine performs no inference.
pub async fn analyze(
    _ctx: &mut EngineContext,
    params: AnalyzeParams,
) -> anyhow::Result<AnalyzeResult> {
    let mut cfg = ChunkingConfig::default();
    if let Some(max) = params.max_chunk_size {
        if max == 0 {
            return Err(EngineError::Validation("maxChunkSize must be positive".to_string()).into());
        }
        cfg.max_chunk_size = max;
    }
    if let Some(overlap) = params.chunk_overlap {
        cfg.chunk_overlap = overlap;
    }
    let chunks = chunk_document(&params.doc_id, &params.content, &cfg);
    Ok(AnalyzeResult { chunks })
}

// ─────────────────── recents and status ─────────────────

#[derive(Debug, Deserialize)]
pub struct RecordOpenParams {
    pub path: String,
    #[serde(default)]
    pub ts: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OkResult {
    pub ok: bool,
}

/// Upsert a recent-open record; `ts` defaults to the current time.
pub async fn record_open(
    ctx: &mut EngineContext,
    params: RecordOpenParams,
) -> anyhow::Result<OkResult> {
    let ts = params.ts.unwrap_or_else(now_ts);
    ctx.recent_open()?.record(&params.path, ts).await?;
    Ok(OkResult { ok: true })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRecentParams {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

fn default_top_k() -> i64 {
    10
}

impl Default for GetRecentParams {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

pub async fn get_recent(
    ctx: &mut EngineContext,
    params: GetRecentParams,
) -> anyhow::Result<Vec<RecentDoc>> {
    let recents = ctx.recent_open()?.recent(params.top_k).await?;
    Ok(recents)
}

/// Status derived from relational state plus the in-memory ready flag.
/// Ready is true as soon as either signal says so: the flag flips on
/// the first non-empty index call before the build timestamp lands.
pub async fn get_status(ctx: &mut EngineContext) -> anyhow::Result<IndexStatus> {
    let state = ctx.index_state()?;
    let index_built_at = state.get_i64(KEY_INDEX_BUILT_AT).await?;
    let indexed_docs = state.get_i64(KEY_INDEXED_DOCS).await?.unwrap_or(0);
    Ok(IndexStatus {
        index_built_at,
        indexed_docs,
        is_ready: ctx.is_ready() || index_built_at.is_some(),
    })
}

pub async fn get_indexed_paths(ctx: &mut EngineContext) -> anyhow::Result<Vec<IndexedPath>> {
    let paths = ctx.doc_meta()?.all_paths().await?;
    Ok(paths)
}

// ───────────────── reset and export ─────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetParams {
    #[serde(default = "default_clear_recent")]
    pub clear_recent: bool,
}

impl Default for ResetParams {
    fn default() -> Self {
        Self {
            clear_recent: true,
        }
    }
}

fn default_clear_recent() -> bool {
    true
}

/// Clear relational tables and drop in-memory stores. The host must
/// export and persist the now-empty snapshots afterwards, or reopening
/// with the old snapshots will resurrect the deleted index.
pub async fn reset_index(
    ctx: &mut EngineContext,
    params: ResetParams,
) -> anyhow::Result<OkResult> {
    ctx.reset_index(params.clear_recent).await?;
    info!(clear_recent = params.clear_recent, "index reset");
    Ok(OkResult { ok: true })
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    /// Stores to export; defaults to all three.
    #[serde(default)]
    pub types: Option<Vec<StoreKind>>,
}

/// Serialize the requested stores to portable blobs for host-side
/// persistence.
pub async fn export_storage(
    ctx: &mut EngineContext,
    params: ExportParams,
) -> anyhow::Result<StorageBlobs> {
    let kinds = params.types.unwrap_or_else(|| StoreKind::ALL.to_vec());
    let mut blobs = StorageBlobs::default();

    for kind in kinds {
        match kind {
            StoreKind::Relational => {
                // Exporting a store that was never opened is a contract
                // violation, same as any other pre-init access.
                ctx.doc_meta()?;
                let bytes = crate::db::export_snapshot(&ctx.db_path())?;
                blobs.sqlite = Some(BASE64.encode(bytes));
            }
            StoreKind::Text => {
                blobs.orama = Some(ctx.text_index().to_snapshot()?);
            }
            StoreKind::Graph => {
                blobs.graph = Some(ctx.graph().to_snapshot()?);
            }
        }
    }

    Ok(blobs)
}
