//! # Vault Engine worker (`vault-engine`)
//!
//! The `vault-engine` binary is a long-lived worker process driven over
//! standard streams. The host writes one JSON request per line to stdin;
//! the worker writes one JSON response per line to stdout. Logs go to
//! stderr so they never interleave with the protocol stream.
//!
//! ## Usage
//!
//! ```bash
//! vault-engine --data-dir ~/.vault-engine
//! ```
//!
//! ## Request kinds
//!
//! | Kind | Description |
//! |------|-------------|
//! | `init` | Open the vault database, optionally restoring snapshots |
//! | `index` | Upsert a batch of documents into every store |
//! | `delete` | Remove documents by path from every store |
//! | `search` | Fulltext, vector, or hybrid retrieval |
//! | `analyze` | Split content into chunks without indexing |
//! | `record-open` | Record that a document was opened |
//! | `get-recent` | Recently opened documents, most recent first |
//! | `get-status` | Index readiness and document count |
//! | `get-indexed-paths` | Every indexed `{path, mtime}` pair |
//! | `reset` | Clear all stores for a full rebuild |
//! | `export` | Serialize store snapshots for backup |
//!
//! Every response echoes the request `id`; malformed lines produce an
//! `error` envelope with an empty `id` rather than killing the worker.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use vault_engine::context::EngineContext;
use vault_engine::protocol::{self, ErrorBody, Response};

/// Vault Engine — a document indexing and retrieval worker driven over
/// stdin/stdout.
#[derive(Parser)]
#[command(
    name = "vault-engine",
    about = "Document indexing and retrieval worker for a vault of notes",
    version
)]
struct Cli {
    /// Directory for the vault database and index files.
    ///
    /// Created on `init` if it does not exist. Each vault gets its own
    /// SQLite file underneath this directory.
    #[arg(long, default_value = "./vault-engine-data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(data_dir = %cli.data_dir.display(), "vault engine starting");

    let mut ctx = EngineContext::new(cli.data_dir);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading request line")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match protocol::decode_request(line) {
            Ok(request) => {
                debug!(id = %request.id, kind = %request.kind, "request");
                protocol::dispatch(&mut ctx, request).await
            }
            Err(err) => {
                error!(%err, "malformed request line");
                Response {
                    id: String::new(),
                    kind: "error".to_string(),
                    payload: None,
                    error: Some(ErrorBody {
                        message: format!("{err:#}"),
                        code: Some("protocol".to_string()),
                    }),
                }
            }
        };

        let encoded = protocol::encode_response(&response);
        let mut out = stdout.lock();
        out.write_all(encoded.as_bytes())
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush())
            .context("writing response")?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}
