//! Error types for the sync engine.

use thiserror::Error;
use yearsync_protocol::CodecError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a year sync.
///
/// Phase-level errors end the session; item-level errors (`Lookup`,
/// `Merge`) are logged and the session carries on without that item.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No auth token could be acquired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network error or non-OK status.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status, if the server answered.
        status: Option<u16>,
    },

    /// A network phase exceeded its time budget.
    #[error("{phase} timed out")]
    Timeout {
        /// Phase that timed out.
        phase: &'static str,
    },

    /// Response bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[source] CodecError),

    /// Request could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] CodecError),

    /// Resolving a single missing episode or listing failed.
    #[error("lookup failed for {id}: {message}")]
    Lookup {
        /// Episode or podcast id being looked up.
        id: String,
        /// Error message.
        message: String,
    },

    /// Writing a podcast's listing to local storage failed.
    #[error("merge failed for podcast {podcast_id}: {message}")]
    Merge {
        /// Podcast whose listing was being written.
        podcast_id: String,
        /// Error message.
        message: String,
    },

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A worker task could not be scheduled or panicked.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl SyncError {
    /// Creates a transport error with no status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a transport error for a non-OK HTTP status.
    pub fn http_status(status: u16) -> Self {
        Self::Transport {
            message: format!("server responded with status {status}"),
            status: Some(status),
        }
    }

    /// Creates a lookup error.
    pub fn lookup(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Returns true if this error ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Lookup { .. } | SyncError::Merge { .. })
    }

    /// Returns the HTTP status carried by a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(SyncError::Auth("expired".into()).is_fatal());
        assert!(SyncError::http_status(500).is_fatal());
        assert!(SyncError::Timeout { phase: "probe" }.is_fatal());
        assert!(SyncError::Decode(CodecError::decoding_failed("eof")).is_fatal());
        assert!(!SyncError::lookup("ep-1", "not found").is_fatal());
        assert!(!SyncError::Merge {
            podcast_id: "pod-1".into(),
            message: "disk full".into()
        }
        .is_fatal());
    }

    #[test]
    fn error_display() {
        let err = SyncError::http_status(503);
        assert_eq!(err.to_string(), "transport error: server responded with status 503");
        assert_eq!(err.status(), Some(503));

        let err = SyncError::Timeout { phase: "pull" };
        assert_eq!(err.to_string(), "pull timed out");
        assert_eq!(err.status(), None);
    }
}
