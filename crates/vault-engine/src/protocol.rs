//! Protocol router: envelope decode, dispatch, encode.
//!
//! The router only knows the envelope shape `{id, kind, payload}` —
//! individual handler semantics live in [`crate::handlers`]. The
//! correlation `id` is always echoed so the host can match responses to
//! outstanding requests out of order. Unknown kinds produce an error
//! envelope, never a crash. Requests are handled one at a time to
//! completion; the engine's internal state never sees concurrent
//! mutation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use vault_engine_core::error::EngineError;

use crate::context::EngineContext;
use crate::handlers;

/// Inbound request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Error body of an error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Outbound response envelope (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn ok(id: String, kind: &str, payload: Value) -> Self {
        Self {
            id,
            kind: format!("{kind}-result"),
            payload: Some(payload),
            error: None,
        }
    }

    fn fail(id: String, err: &anyhow::Error) -> Self {
        let code = err
            .downcast_ref::<EngineError>()
            .map(|e| e.code().to_string());
        Self {
            id,
            kind: "error".to_string(),
            payload: None,
            error: Some(ErrorBody {
                message: format!("{err:#}"),
                code,
            }),
        }
    }
}

/// Decode one request envelope from its JSON text.
pub fn decode_request(raw: &str) -> Result<Request, EngineError> {
    serde_json::from_str(raw)
        .map_err(|e| EngineError::Protocol(format!("malformed request envelope: {e}")))
}

/// Encode a response envelope as JSON text.
pub fn encode_response(response: &Response) -> String {
    // Envelope types contain nothing unserializable.
    serde_json::to_string(response).expect("response envelope serializes")
}

/// Dispatch a request to its handler and wrap the outcome in an
/// envelope. Handler failures become error envelopes with the engine
/// error code attached; they never propagate out of the router.
pub async fn dispatch(ctx: &mut EngineContext, request: Request) -> Response {
    debug!(id = %request.id, kind = %request.kind, "dispatch");
    let Request { id, kind, payload } = request;
    match route(ctx, &kind, payload).await {
        Ok(value) => Response::ok(id, &kind, value),
        Err(err) => Response::fail(id, &err),
    }
}

async fn route(ctx: &mut EngineContext, kind: &str, payload: Value) -> anyhow::Result<Value> {
    match kind {
        "init" => to_value(handlers::init(ctx, parse(payload)?).await?),
        "index" => to_value(handlers::index_documents(ctx, parse(payload)?).await?),
        "delete" => to_value(handlers::delete_documents(ctx, parse(payload)?).await?),
        "search" => to_value(handlers::search(ctx, parse(payload)?).await?),
        "analyze" => to_value(handlers::analyze(ctx, parse(payload)?).await?),
        "record-open" => to_value(handlers::record_open(ctx, parse(payload)?).await?),
        "get-recent" => to_value(handlers::get_recent(ctx, parse_or_default(payload)?).await?),
        "get-status" => to_value(handlers::get_status(ctx).await?),
        "get-indexed-paths" => to_value(handlers::get_indexed_paths(ctx).await?),
        "reset" => to_value(handlers::reset_index(ctx, parse_or_default(payload)?).await?),
        "export" => to_value(handlers::export_storage(ctx, parse_or_default(payload)?).await?),
        other => Err(EngineError::Protocol(format!("unknown request kind: {other}")).into()),
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> anyhow::Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| EngineError::Protocol(format!("invalid payload: {e}")).into())
}

/// Like [`parse`], but a missing/null payload means defaults.
fn parse_or_default<T: DeserializeOwned + Default>(payload: Value) -> anyhow::Result<T> {
    if payload.is_null() {
        return Ok(T::default());
    }
    parse(payload)
}

fn to_value<T: Serialize>(result: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(result)?)
}
