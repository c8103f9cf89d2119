//! In-process history server.
//!
//! Serves the year history endpoint over the loopback client using the real
//! CBOR wire format, and records what it was sent.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use yearsync_engine::{AuthToken, HttpResponse, LoopbackServer};
use yearsync_protocol::{
    DiffResponse, HistoryChange, ProbeResponse, SyncRequest, HISTORY_YEAR_PATH, PROTOCOL_VERSION,
};

/// Bytes that do not decode as a diff response.
pub const MALFORMED_BODY: &[u8] = &[0xbf, 0x67, 0x68, 0x69];

#[derive(Default)]
struct ServerState {
    changes: HashMap<i32, Vec<HistoryChange>>,
    counts: HashMap<i32, i64>,
    forced_status: Option<u16>,
    malformed_diffs: bool,
    requests: Vec<SyncRequest>,
    rejected: u64,
}

/// A history server for loopback tests.
#[derive(Default)]
pub struct HistoryServer {
    state: RwLock<ServerState>,
    accepted_token: Option<String>,
}

impl HistoryServer {
    /// Creates a server that accepts any token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server that only accepts `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            state: RwLock::default(),
            accepted_token: Some(token.into()),
        }
    }

    /// Adds a change to the year's history.
    pub fn record(&self, year: i32, change: HistoryChange) {
        self.state.write().changes.entry(year).or_default().push(change);
    }

    /// Overrides the count the probe reports for `year`.
    pub fn set_count(&self, year: i32, count: i64) {
        self.state.write().counts.insert(year, count);
    }

    /// Answers every request with `status` and an empty body.
    pub fn force_status(&self, status: u16) {
        self.state.write().forced_status = Some(status);
    }

    /// Makes diff requests return undecodable bytes.
    pub fn serve_malformed_diffs(&self) {
        self.state.write().malformed_diffs = true;
    }

    /// The count the probe reports for `year`.
    ///
    /// Without an override this is the number of distinct episodes changed.
    pub fn count_for(&self, year: i32) -> i64 {
        let state = self.state.read();
        if let Some(count) = state.counts.get(&year) {
            return *count;
        }
        state
            .changes
            .get(&year)
            .map(|changes| {
                changes
                    .iter()
                    .map(|c| c.episode_id.as_str())
                    .collect::<HashSet<_>>()
                    .len() as i64
            })
            .unwrap_or(0)
    }

    /// Every decoded request, in arrival order.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.state.read().requests.clone()
    }

    /// Number of count-only requests.
    pub fn probe_count(&self) -> usize {
        self.state.read().requests.iter().filter(|r| r.count_only).count()
    }

    /// Number of diff requests.
    pub fn pull_count(&self) -> usize {
        self.state.read().requests.iter().filter(|r| !r.count_only).count()
    }

    /// Number of requests turned away before decoding.
    pub fn rejected_count(&self) -> u64 {
        self.state.read().rejected
    }

    fn reject(&self, status: u16) -> Result<HttpResponse, String> {
        self.state.write().rejected += 1;
        Ok(HttpResponse::status(status))
    }

    fn respond(&self, request: SyncRequest) -> Result<HttpResponse, String> {
        if request.count_only {
            let body = ProbeResponse::new(self.count_for(request.year))
                .encode()
                .map_err(|e| e.to_string())?;
            return Ok(HttpResponse::ok(body));
        }

        let state = self.state.read();
        if state.malformed_diffs {
            return Ok(HttpResponse::ok(MALFORMED_BODY.to_vec()));
        }
        let changes = state.changes.get(&request.year).cloned().unwrap_or_default();
        drop(state);

        let body = DiffResponse::new(changes)
            .encode()
            .map_err(|e| e.to_string())?;
        Ok(HttpResponse::ok(body))
    }
}

impl LoopbackServer for HistoryServer {
    fn handle_post(
        &self,
        path: &str,
        token: &AuthToken,
        body: &[u8],
    ) -> Result<HttpResponse, String> {
        if path != HISTORY_YEAR_PATH {
            return self.reject(404);
        }

        if let Some(accepted) = &self.accepted_token {
            if token.as_str() != accepted {
                return self.reject(401);
            }
        }

        let forced = self.state.read().forced_status;
        if let Some(status) = forced {
            return self.reject(status);
        }

        let request = match SyncRequest::decode(body) {
            Ok(request) => request,
            Err(_) => return self.reject(400),
        };
        if request.version != PROTOCOL_VERSION {
            return self.reject(400);
        }

        self.state.write().requests.push(request);
        self.respond(request)
    }
}
