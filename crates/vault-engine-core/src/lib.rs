//! # Vault Engine Core
//!
//! Shared, pure logic for the vault index engine: data models, the
//! chunking engine, the in-memory full-text/vector index, the document
//! relationship graph, and the hybrid search scoring algorithm.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything here operates on plain values
//! and is exercised by the `vault-engine` runtime crate through the
//! request protocol.

pub mod chunk;
pub mod error;
pub mod graph;
pub mod models;
pub mod search;
pub mod text_index;
