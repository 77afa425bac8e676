//! Read boundary for account history.
//!
//! This module defines **only** the history-source trait and its error type.
//! Grouping, ordering and paging live in `history`; no node transport
//! belongs here.

use async_trait::async_trait;
use thiserror::Error;

use crate::RawOperation;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Collaborator I/O failure.
///
/// Retrying is the caller's decision. [`crate::AccountHistory`] re-fetches a
/// failed batch only when its consumer asks, and a bounded number of times.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network or connection failure.
    #[error("transport error: {0}")]
    Unreachable(String),
    /// The node or service answered with an application-level error.
    #[error("{}", api_message(.code, .message))]
    Api { code: Option<i64>, message: String },
}

fn api_message(code: &Option<i64>, message: &str) -> String {
    match code {
        Some(c) => format!("api error code={c}: {message}"),
        None => format!("api error: {message}"),
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Batched account-history reads.
///
/// `from = -1` asks for the most recent operations. A batch is returned
/// oldest-first and covers global indices `(from - limit, from]`.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Human-readable name of the backing transport (e.g. `"steemd"`).
    fn name(&self) -> &'static str;

    async fn fetch_history_batch(
        &self,
        account: &str,
        from: i64,
        limit: u32,
    ) -> Result<Vec<RawOperation>, TransportError>;
}
