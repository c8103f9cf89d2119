//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for year sync. The actual
//! HTTP client and the token source are abstracted via traits so that any
//! HTTP library, or an in-process loopback, can be plugged in.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::AuthToken;
use crate::transport::HistoryTransport;
use yearsync_protocol::{CodecResult, DiffResponse, ProbeResponse, SyncRequest};

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a 200 response.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Creates an empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends an authenticated POST request.
    ///
    /// `Err` means no response was received at all.
    fn post(&self, url: &str, token: &AuthToken, body: Vec<u8>) -> Result<HttpResponse, String>;
}

/// Source of auth tokens.
pub trait TokenProvider: Send + Sync {
    /// Acquires a token, refreshing it if needed.
    fn acquire_token(&self) -> Result<AuthToken, String>;
}

/// A token provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<AuthToken>,
}

impl StaticTokenProvider {
    /// Provides `token` on every call.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(AuthToken::new(token)),
        }
    }

    /// A provider that is signed out and always fails.
    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn acquire_token(&self) -> Result<AuthToken, String> {
        self.token.clone().ok_or_else(|| "not signed in".into())
    }
}

/// Trait for decoding response bodies.
pub trait CborDecode: Sized {
    /// Decodes self from CBOR bytes.
    fn decode_cbor(bytes: &[u8]) -> CodecResult<Self>;
}

impl CborDecode for ProbeResponse {
    fn decode_cbor(bytes: &[u8]) -> CodecResult<Self> {
        Self::decode(bytes)
    }
}

impl CborDecode for DiffResponse {
    fn decode_cbor(bytes: &[u8]) -> CodecResult<Self> {
        Self::decode(bytes)
    }
}

/// HTTP-based history transport.
///
/// Uses CBOR encoding for request/response bodies. Both phases are posted
/// to the same year history endpoint.
pub struct HttpTransport<C: HttpClient, P: TokenProvider> {
    endpoint: String,
    client: C,
    tokens: P,
}

impl<C: HttpClient, P: TokenProvider> HttpTransport<C, P> {
    /// Creates a new HTTP transport.
    pub fn new(config: &SyncConfig, client: C, tokens: P) -> Self {
        Self {
            endpoint: config.endpoint_url(),
            client,
            tokens,
        }
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn post_cbor<Res: CborDecode>(
        &self,
        token: &AuthToken,
        request: &SyncRequest,
    ) -> SyncResult<Res> {
        let body = request.encode().map_err(SyncError::Encode)?;

        let response = self
            .client
            .post(&self.endpoint, token, body)
            .map_err(SyncError::transport)?;

        if !response.is_success() {
            return Err(SyncError::http_status(response.status));
        }

        Res::decode_cbor(&response.body).map_err(SyncError::Decode)
    }
}

impl<C: HttpClient, P: TokenProvider> HistoryTransport for HttpTransport<C, P> {
    fn acquire_token(&self) -> SyncResult<AuthToken> {
        self.tokens.acquire_token().map_err(SyncError::Auth)
    }

    fn probe(&self, token: &AuthToken, request: &SyncRequest) -> SyncResult<ProbeResponse> {
        self.post_cbor(token, request)
    }

    fn pull(&self, token: &AuthToken, request: &SyncRequest) -> SyncResult<DiffResponse> {
        self.post_cbor(token, request)
    }
}

/// A loopback HTTP client that routes requests directly to a history server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request and returns the response.
    fn handle_post(&self, path: &str, token: &AuthToken, body: &[u8])
        -> Result<HttpResponse, String>;
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, token: &AuthToken, body: Vec<u8>) -> Result<HttpResponse, String> {
        // Strip scheme and host
        let path = url
            .find("://")
            .map(|i| &url[i + 3..])
            .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or(url);

        self.server.handle_post(path, token, &body)
    }
}
