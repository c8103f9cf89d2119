//! Single-use reconciliation session.
//!
//! A session walks `AcquireToken → Probe → Pull → Resolve → Merge` once and
//! ends in `Done`. Phase failures end the session early with `false`;
//! item-level failures inside Resolve and Merge are logged and skipped.

use crate::cache::ExistenceCache;
use crate::catalog::RemoteCatalog;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::merge::BulkMerge;
use crate::pool::WorkerPool;
use crate::resolver::ConcurrentResolver;
use crate::storage::HistoryStore;
use crate::transport::HistoryTransport;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use yearsync_protocol::SyncRequest;

/// The states a session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Acquiring the auth token.
    AcquireToken,
    /// Sending the count-only request.
    Probe,
    /// Sending the full diff request.
    Pull,
    /// Resolving missing episodes and fetching listings.
    Resolve,
    /// Writing staged listings.
    Merge,
    /// Terminal state with the session outcome.
    Done(bool),
}

impl SessionState {
    /// Returns true for the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done(_))
    }
}

/// Per-session counters, logged when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Count reported by the probe.
    pub remote_count: i64,
    /// Interactions recorded locally for the year.
    pub local_count: i64,
    /// Changes in the diff response.
    pub changes_received: usize,
    /// Changes whose episode already existed.
    pub already_present: usize,
    /// Distinct missing episodes.
    pub missing: usize,
    /// Missing episodes created locally.
    pub resolved: usize,
    /// Missing episodes that could not be resolved.
    pub lookup_failures: usize,
    /// Podcasts whose listing was merged.
    pub podcasts_refreshed: usize,
    /// Listing fetches or writes that failed.
    pub merge_failures: usize,
}

/// Everything a finished session reports.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Session id, as logged.
    pub session_id: Uuid,
    /// Whether the session succeeded.
    pub success: bool,
    /// The phase failure that ended the session, if any.
    pub error: Option<SyncError>,
    /// Every state entered, in order.
    pub trace: Vec<SessionState>,
    /// POSTs attempted against the history endpoint.
    pub round_trips: u32,
    /// Per-session counters.
    pub summary: SessionSummary,
}

/// One reconciliation attempt for one year.
///
/// The session is consumed by [`run`](Self::run), so each instance makes at
/// most one attempt.
pub struct ReconciliationSession<'a, T, S, L> {
    id: Uuid,
    year: i32,
    config: &'a SyncConfig,
    transport: Arc<T>,
    storage: Arc<S>,
    catalog: Arc<L>,
    pool: &'a WorkerPool,
    trace: Vec<SessionState>,
    round_trips: u32,
    summary: SessionSummary,
}

impl<'a, T, S, L> ReconciliationSession<'a, T, S, L>
where
    T: HistoryTransport + 'static,
    S: HistoryStore + 'static,
    L: RemoteCatalog + 'static,
{
    /// Creates a session for `year`.
    pub fn new(
        year: i32,
        config: &'a SyncConfig,
        transport: Arc<T>,
        storage: Arc<S>,
        catalog: Arc<L>,
        pool: &'a WorkerPool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            year,
            config,
            transport,
            storage,
            catalog,
            pool,
            trace: Vec::new(),
            round_trips: 0,
            summary: SessionSummary::default(),
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the session and returns whether it succeeded.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn run(self) -> bool {
        self.execute().success
    }

    /// Runs the session and returns the full outcome.
    pub fn execute(mut self) -> SessionOutcome {
        let span = info_span!("year_sync", session = %self.id, year = self.year);
        let _guard = span.enter();

        let error = self.drive().err();
        let success = error.is_none();
        if let Some(e) = &error {
            warn!(error = %e, "year sync failed");
        }
        self.enter(SessionState::Done(success));

        let summary = self.summary;
        info!(
            success,
            round_trips = self.round_trips,
            remote = summary.remote_count,
            local = summary.local_count,
            received = summary.changes_received,
            missing = summary.missing,
            resolved = summary.resolved,
            lookup_failures = summary.lookup_failures,
            refreshed = summary.podcasts_refreshed,
            merge_failures = summary.merge_failures,
            "year sync finished"
        );

        SessionOutcome {
            session_id: self.id,
            success,
            error,
            trace: self.trace,
            round_trips: self.round_trips,
            summary,
        }
    }

    fn drive(&mut self) -> SyncResult<()> {
        self.enter(SessionState::AcquireToken);
        let token = self.transport.acquire_token()?;

        self.enter(SessionState::Probe);
        let probe = SyncRequest::probe(self.year, Utc::now().timestamp_millis())
            .with_version(self.config.protocol_version);
        let probe_token = token.clone();
        let remote = self
            .remote_call("probe", move |transport| transport.probe(&probe_token, &probe))?
            .count;
        let local = self.storage.count_interactions_for_year(self.year)?;
        self.summary.remote_count = remote;
        self.summary.local_count = local;

        if remote <= local {
            debug!(remote, local, "local history caught up");
            return Ok(());
        }

        self.enter(SessionState::Pull);
        let diff = SyncRequest::diff(self.year, Utc::now().timestamp_millis())
            .with_version(self.config.protocol_version);
        let changes = self
            .remote_call("pull", move |transport| transport.pull(&token, &diff))?
            .into_changes();
        self.summary.changes_received = changes.len();

        self.enter(SessionState::Resolve);
        let mut cache = ExistenceCache::new();
        let resolver = ConcurrentResolver::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.catalog),
            self.pool,
        );
        let resolution = resolver.resolve(changes, &mut cache);
        self.summary.already_present = resolution.already_present;
        self.summary.missing = resolution.missing;
        self.summary.resolved = resolution.resolved;
        self.summary.lookup_failures = resolution.lookup_failures;

        self.enter(SessionState::Merge);
        let merged = BulkMerge::new(self.storage.as_ref()).apply(&resolution.listings);
        self.summary.podcasts_refreshed = merged.podcasts_merged;
        self.summary.merge_failures = resolution.listing_failures + merged.failures;

        Ok(())
    }

    fn remote_call<R, F>(&mut self, phase: &'static str, call: F) -> SyncResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&T) -> SyncResult<R> + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        self.round_trips += 1;
        self.pool
            .call(phase, self.config.phase_timeout, move || call(transport.as_ref()))
    }

    fn enter(&mut self, state: SessionState) {
        debug!(state = ?state, "session state");
        self.trace.push(state);
    }
}
