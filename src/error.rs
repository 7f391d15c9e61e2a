//! Error taxonomy for the watch core.
//!
//! Every variant here is recoverable from the watcher's point of view: a
//! failed tick is reported and retried on the next interval. Ambiguous
//! closures and session timeouts are terminal states, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// Snapshot or log source unreachable (transport error, bad status, bad JSON).
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// A collaborator call exceeded its per-call deadline.
    #[error("{what} timed out after {after_secs}s")]
    Timeout { what: &'static str, after_secs: u64 },

    /// The snapshot parsed, but the tracked record is missing required fields.
    #[error("Malformed record for {symbol}: {reason}")]
    MalformedResponse { symbol: String, reason: String },

    /// The structured log could not be read.
    #[error("Log evidence unavailable: {0}")]
    EvidenceUnavailable(String),
}

pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchError::Timeout {
            what: "position snapshot",
            after_secs: 10,
        };
        assert_eq!(err.to_string(), "position snapshot timed out after 10s");

        let err = WatchError::MalformedResponse {
            symbol: "SQDUSDT".to_string(),
            reason: "missing entry_price".to_string(),
        };
        assert!(err.to_string().contains("SQDUSDT"));
    }
}
