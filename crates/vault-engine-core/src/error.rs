//! Engine error taxonomy.
//!
//! Every failure surfaced through the request protocol maps to one of
//! these variants; the protocol router attaches [`EngineError::code`]
//! to the outbound error envelope so hosts can branch on the class of
//! failure without parsing messages.
//!
//! Best-effort read failures (a single document failing to load during
//! a scan) are not represented here: they are logged and skipped at the
//! call site and never abort a batch.

use thiserror::Error;

/// Closed error taxonomy for the vault index engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed envelope or unknown request kind. Always reported to
    /// the caller; never crashes the router.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A store was accessed before `init_database`/`init_repos`. This is
    /// a usage contract violation, not a recoverable condition.
    #[error("{0} accessed before initialization")]
    NotInitialized(&'static str),

    /// Invalid request input, e.g. a query embedding with the wrong
    /// dimension. The request fails cleanly; index state is untouched.
    #[error("{0}")]
    Validation(String),

    /// Snapshot import/export failed. The in-memory index remains
    /// usable; persistence is decoupled from serving.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Stable wire code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Protocol(_) => "protocol",
            EngineError::NotInitialized(_) => "not_initialized",
            EngineError::Validation(_) => "validation",
            EngineError::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::Protocol("x".into()).code(), "protocol");
        assert_eq!(EngineError::NotInitialized("pool").code(), "not_initialized");
        assert_eq!(EngineError::Validation("x".into()).code(), "validation");
        assert_eq!(EngineError::Persistence("x".into()).code(), "persistence");
    }

    #[test]
    fn not_initialized_message_names_the_store() {
        let err = EngineError::NotInitialized("doc metadata repo");
        assert_eq!(
            err.to_string(),
            "doc metadata repo accessed before initialization"
        );
    }
}
