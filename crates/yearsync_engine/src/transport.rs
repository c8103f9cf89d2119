//! Transport layer abstraction for year history sync.

use crate::error::{SyncError, SyncResult};
use crate::model::AuthToken;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use yearsync_protocol::{DiffResponse, ProbeResponse, SyncRequest};

/// A history transport handles the authenticated exchange with the server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, loopback, mock for testing).
pub trait HistoryTransport: Send + Sync {
    /// Acquires an auth token for this session.
    fn acquire_token(&self) -> SyncResult<AuthToken>;

    /// Sends a count-only request.
    fn probe(&self, token: &AuthToken, request: &SyncRequest) -> SyncResult<ProbeResponse>;

    /// Sends a full diff request.
    fn pull(&self, token: &AuthToken, request: &SyncRequest) -> SyncResult<DiffResponse>;
}

/// A mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    token: Mutex<Option<AuthToken>>,
    probe_response: Mutex<Option<SyncResult<ProbeResponse>>>,
    pull_response: Mutex<Option<SyncResult<DiffResponse>>>,
    requests: Mutex<Vec<SyncRequest>>,
    token_requests: AtomicU64,
}

impl MockTransport {
    /// Creates a new mock transport that hands out a fixed token.
    pub fn new() -> Self {
        let transport = Self::default();
        transport.set_token(Some(AuthToken::new("mock-token")));
        transport
    }

    /// Sets the token, or `None` to make token acquisition fail.
    pub fn set_token(&self, token: Option<AuthToken>) {
        *self.token.lock() = token;
    }

    /// Sets the probe response.
    pub fn set_probe_response(&self, response: SyncResult<ProbeResponse>) {
        *self.probe_response.lock() = Some(response);
    }

    /// Sets the pull response.
    pub fn set_pull_response(&self, response: SyncResult<DiffResponse>) {
        *self.pull_response.lock() = Some(response);
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests sent (network round trips).
    pub fn round_trips(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of token acquisitions.
    pub fn token_requests(&self) -> u64 {
        self.token_requests.load(Ordering::SeqCst)
    }

    fn take<R>(slot: &Mutex<Option<SyncResult<R>>>, what: &str) -> SyncResult<R> {
        slot.lock()
            .take()
            .unwrap_or_else(|| Err(SyncError::transport(format!("no mock {what} response set"))))
    }
}

impl HistoryTransport for MockTransport {
    fn acquire_token(&self) -> SyncResult<AuthToken> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        self.token
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Auth("no mock token set".into()))
    }

    fn probe(&self, _token: &AuthToken, request: &SyncRequest) -> SyncResult<ProbeResponse> {
        self.requests.lock().push(*request);
        Self::take(&self.probe_response, "probe")
    }

    fn pull(&self, _token: &AuthToken, request: &SyncRequest) -> SyncResult<DiffResponse> {
        self.requests.lock().push(*request);
        Self::take(&self.pull_response, "pull")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_token() {
        let transport = MockTransport::new();
        assert!(transport.acquire_token().is_ok());

        transport.set_token(None);
        assert!(matches!(transport.acquire_token(), Err(SyncError::Auth(_))));
        assert_eq!(transport.token_requests(), 2);
    }

    #[test]
    fn mock_transport_records_requests() {
        let transport = MockTransport::new();
        let token = transport.acquire_token().unwrap();
        transport.set_probe_response(Ok(ProbeResponse::new(3)));

        let response = transport
            .probe(&token, &SyncRequest::probe(2024, 0))
            .unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(transport.round_trips(), 1);
        assert!(transport.requests()[0].count_only);
    }

    #[test]
    fn mock_transport_unset_response() {
        let transport = MockTransport::new();
        let token = transport.acquire_token().unwrap();
        let result = transport.pull(&token, &SyncRequest::diff(2024, 0));
        assert!(matches!(result, Err(SyncError::Transport { .. })));
    }
}
