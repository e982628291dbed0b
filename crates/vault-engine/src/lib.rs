//! # Vault Engine
//!
//! **A local-first document indexing and retrieval engine for a vault
//! of notes.**
//!
//! The engine runs as a worker process speaking a line-oriented JSON
//! protocol over stdin/stdout. Documents flow into three stores kept in
//! lockstep: a SQLite metadata store, an in-memory text/vector index,
//! and an in-memory graph index of wiki links and tags. A host-side
//! reconciliation driver and debounced update queue keep the index
//! aligned with the corpus on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  JSON lines  ┌───────────┐   ┌───────────────┐
//! │   Host   │─────────────▶│  protocol  │──▶│   handlers    │
//! │ (stdin)  │◀─────────────│  dispatch  │   └──────┬────────┘
//! └──────────┘              └───────────┘          │
//!                                        ┌─────────┼──────────┐
//!                                        ▼         ▼          ▼
//!                                   ┌────────┐ ┌───────┐ ┌───────┐
//!                                   │ SQLite │ │ text/ │ │ graph │
//!                                   │  meta  │ │vector │ │ index │
//!                                   └────────┘ └───────┘ └───────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`protocol`] | Request/response envelopes and the dispatch router |
//! | [`handlers`] | One handler per request kind |
//! | [`context`] | Per-process engine state: pool, repos, in-memory indexes |
//! | [`db`] | SQLite connection and whole-file snapshot import/export |
//! | [`migrate`] | Idempotent schema migrations |
//! | [`repos`] | Typed repositories over the metadata tables |
//! | [`progress`] | Progress reporting for long-running indexing |
//! | [`reconcile`] | Startup reconciliation: diff the corpus against the index |
//! | [`update_queue`] | Debounced incremental updates from change notifications |
//!
//! Pure data types, chunking, search scoring, and the index structures
//! live in the `vault-engine-core` crate so they stay free of async and
//! database dependencies.

pub mod context;
pub mod db;
pub mod handlers;
pub mod migrate;
pub mod progress;
pub mod protocol;
pub mod reconcile;
pub mod repos;
pub mod update_queue;

pub use vault_engine_core as core;
