//! Public entry point.

use crate::catalog::RemoteCatalog;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::pool::WorkerPool;
use crate::session::{ReconciliationSession, SessionOutcome};
use crate::storage::HistoryStore;
use crate::transport::HistoryTransport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cumulative statistics across runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sessions started.
    pub runs: u64,
    /// Sessions that returned true.
    pub succeeded: u64,
    /// Sessions that returned false.
    pub failed: u64,
    /// POSTs attempted against the history endpoint.
    pub round_trips: u64,
    /// Error that ended the last failed session.
    pub last_error: Option<String>,
    /// When the last session finished.
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Reconciles local listening history with the server, one year at a time.
///
/// Each [`run`](Self::run) is an independent session with its own existence
/// cache. Concurrent runs are not coordinated and may race on storage.
pub struct YearSync<T, S, L> {
    config: SyncConfig,
    transport: Arc<T>,
    storage: Arc<S>,
    catalog: Arc<L>,
    pool: WorkerPool,
    stats: RwLock<SyncStats>,
}

impl<T, S, L> YearSync<T, S, L>
where
    T: HistoryTransport + 'static,
    S: HistoryStore + 'static,
    L: RemoteCatalog + 'static,
{
    /// Creates the entry point and its worker pool.
    pub fn new(config: SyncConfig, transport: T, storage: S, catalog: L) -> SyncResult<Self> {
        let pool = WorkerPool::new(&config)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
            storage: Arc::new(storage),
            catalog: Arc::new(catalog),
            pool,
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the local store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the remote catalog.
    pub fn catalog(&self) -> &L {
        &self.catalog
    }

    /// Gets the cumulative stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Creates a session for `year` without running it.
    pub fn session(&self, year: i32) -> ReconciliationSession<'_, T, S, L> {
        ReconciliationSession::new(
            year,
            &self.config,
            Arc::clone(&self.transport),
            Arc::clone(&self.storage),
            Arc::clone(&self.catalog),
            &self.pool,
        )
    }

    /// Reconciles `year` and returns whether it succeeded.
    ///
    /// Never returns an error; failures are logged and reported as `false`.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn run(&self, year: i32) -> bool {
        self.run_detailed(year).success
    }

    /// Reconciles `year` and returns the full session outcome.
    pub fn run_detailed(&self, year: i32) -> SessionOutcome {
        let outcome = self.session(year).execute();
        self.record(&outcome);
        outcome
    }

    fn record(&self, outcome: &SessionOutcome) {
        let mut stats = self.stats.write();
        stats.runs += 1;
        stats.round_trips += u64::from(outcome.round_trips);
        stats.last_run_at = Some(Utc::now());
        if outcome.success {
            stats.succeeded += 1;
        } else {
            stats.failed += 1;
            stats.last_error = outcome.error.as_ref().map(ToString::to_string);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::storage::MemoryHistoryStore;
    use crate::transport::MockTransport;
    use crate::model::AuthToken;
    use std::time::{Duration, Instant};
    use yearsync_protocol::{DiffResponse, ProbeResponse, SyncRequest};

    fn year_sync() -> YearSync<MockTransport, MemoryHistoryStore, MemoryCatalog> {
        YearSync::new(
            SyncConfig::new("https://api.example.com"),
            MockTransport::new(),
            MemoryHistoryStore::new(),
            MemoryCatalog::new(),
        )
        .unwrap()
    }

    #[test]
    fn initial_stats() {
        let sync = year_sync();
        let stats = sync.stats();
        assert_eq!(stats.runs, 0);
        assert!(stats.last_run_at.is_none());
    }

    #[test]
    fn stats_accumulate_across_runs() {
        let sync = year_sync();

        sync.transport().set_probe_response(Ok(ProbeResponse::new(0)));
        assert!(sync.run(2023));

        sync.transport().set_token(None);
        assert!(!sync.run(2023));

        let stats = sync.stats();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.round_trips, 1);
        assert!(stats.last_error.unwrap().contains("authentication"));
        assert!(stats.last_run_at.is_some());
    }

    #[test]
    fn each_run_is_a_fresh_session() {
        let sync = year_sync();

        sync.transport().set_probe_response(Ok(ProbeResponse::new(0)));
        let first = sync.run_detailed(2024);
        sync.transport().set_probe_response(Ok(ProbeResponse::new(0)));
        let second = sync.run_detailed(2024);

        assert!(first.success && second.success);
        assert_ne!(first.session_id, second.session_id);
    }

    struct HungTransport;

    impl HistoryTransport for HungTransport {
        fn acquire_token(&self) -> SyncResult<AuthToken> {
            Ok(AuthToken::new("hung"))
        }

        fn probe(&self, _token: &AuthToken, _request: &SyncRequest) -> SyncResult<ProbeResponse> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(ProbeResponse::new(0))
        }

        fn pull(&self, _token: &AuthToken, _request: &SyncRequest) -> SyncResult<DiffResponse> {
            Ok(DiffResponse::default())
        }
    }

    #[test]
    fn timed_out_sync_drops_promptly() {
        let config = SyncConfig::new("https://api.example.com")
            .with_phase_timeout(Duration::from_millis(20));
        let sync = YearSync::new(
            config,
            HungTransport,
            MemoryHistoryStore::new(),
            MemoryCatalog::new(),
        )
        .unwrap();

        let started = Instant::now();
        assert!(!sync.run(2024));
        drop(sync);

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
