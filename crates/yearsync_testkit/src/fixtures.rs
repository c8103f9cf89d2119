//! Test fixtures and scenario helpers.
//!
//! A [`Scenario`] wires a [`YearSync`] to a [`HistoryServer`] through the HTTP
//! transport and loopback client, so tests exercise real wire bytes.

use crate::server::HistoryServer;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use yearsync_engine::{
    Episode, HistoryStore, HttpTransport, LoopbackClient, MemoryCatalog, MemoryHistoryStore,
    Podcast, StaticTokenProvider, SyncConfig, SyncResult, YearSync,
};
use yearsync_protocol::HistoryChange;

/// Token the scenario server accepts.
pub const TEST_TOKEN: &str = "test-token";

/// Server URL used by scenarios.
pub const TEST_SERVER_URL: &str = "https://history.test";

/// Transport used by scenarios.
pub type LoopbackTransport = HttpTransport<LoopbackClient<HistoryServer>, StaticTokenProvider>;

/// A fully wired entry point over loopback.
pub type LoopbackYearSync = YearSync<LoopbackTransport, CountingStore<MemoryHistoryStore>, MemoryCatalog>;

/// Returns the epoch milliseconds of noon UTC on the given date.
///
/// # Panics
///
/// Panics on an invalid date.
pub fn millis(year: i32, month: u32, day: u32) -> i64 {
    noon(year, month, day).timestamp_millis()
}

/// Returns noon UTC on the given date.
///
/// # Panics
///
/// Panics on an invalid date.
pub fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid date")
}

/// A storage wrapper that counts calls.
pub struct CountingStore<S> {
    inner: S,
    exists_queries: Mutex<HashMap<String, u64>>,
    writes: AtomicU64,
}

impl<S: HistoryStore> CountingStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            exists_queries: Mutex::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Existence queries issued for `episode_id`.
    pub fn exists_queries_for(&self, episode_id: &str) -> u64 {
        self.exists_queries
            .lock()
            .get(episode_id)
            .copied()
            .unwrap_or(0)
    }

    /// Existence queries issued in total.
    pub fn exists_queries(&self) -> u64 {
        self.exists_queries.lock().values().sum()
    }

    /// Write calls issued (interactions, upserts, podcast inserts).
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S: HistoryStore> HistoryStore for CountingStore<S> {
    fn count_interactions_for_year(&self, year: i32) -> SyncResult<i64> {
        self.inner.count_interactions_for_year(year)
    }

    fn episode_exists(&self, episode_id: &str) -> SyncResult<bool> {
        *self
            .exists_queries
            .lock()
            .entry(episode_id.to_string())
            .or_default() += 1;
        self.inner.episode_exists(episode_id)
    }

    fn record_interaction(&self, episode_id: &str, at: DateTime<Utc>) -> SyncResult<()> {
        self.wrote();
        self.inner.record_interaction(episode_id, at)
    }

    fn upsert_episodes(&self, podcast_id: &str, episodes: &[Episode]) -> SyncResult<()> {
        self.wrote();
        self.inner.upsert_episodes(podcast_id, episodes)
    }

    fn find_podcast(
        &self,
        podcast_id: &str,
        include_unsubscribed: bool,
    ) -> SyncResult<Option<Podcast>> {
        self.inner.find_podcast(podcast_id, include_unsubscribed)
    }

    fn insert_podcast(&self, podcast: &Podcast) -> SyncResult<()> {
        self.wrote();
        self.inner.insert_podcast(podcast)
    }
}

/// Builder for end-to-end sync scenarios.
pub struct Scenario {
    config: SyncConfig,
    server: HistoryServer,
    tokens: StaticTokenProvider,
    store: MemoryHistoryStore,
    catalog: MemoryCatalog,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Starts an empty scenario with a signed-in client.
    pub fn new() -> Self {
        Self {
            config: SyncConfig::new(TEST_SERVER_URL),
            server: HistoryServer::with_token(TEST_TOKEN),
            tokens: StaticTokenProvider::new(TEST_TOKEN),
            store: MemoryHistoryStore::new(),
            catalog: MemoryCatalog::new(),
        }
    }

    /// Adjusts the sync configuration.
    pub fn config(mut self, configure: impl FnOnce(SyncConfig) -> SyncConfig) -> Self {
        self.config = configure(self.config);
        self
    }

    /// Makes token acquisition fail.
    pub fn signed_out(mut self) -> Self {
        self.tokens = StaticTokenProvider::signed_out();
        self
    }

    /// Records `n` local interactions in `year` for episodes the store lacks.
    pub fn local_interactions(self, year: i32, n: u32) -> Self {
        for i in 0..n {
            let day = 1 + i % 28;
            self.store
                .add_interaction(format!("local-{year}-{i}"), noon(year, 1, day));
        }
        self
    }

    /// Adds a podcast to local storage.
    pub fn local_podcast(self, podcast: Podcast) -> Self {
        self.store.add_podcast(podcast);
        self
    }

    /// Adds an episode to local storage.
    pub fn local_episode(self, episode: Episode) -> Self {
        self.store.add_episode(episode);
        self
    }

    /// Adds a change to the server's history for `year`.
    pub fn remote_change(self, year: i32, change: HistoryChange) -> Self {
        self.server.record(year, change);
        self
    }

    /// Overrides the server's probe count for `year`.
    pub fn remote_count(self, year: i32, count: i64) -> Self {
        self.server.set_count(year, count);
        self
    }

    /// Makes every server response carry `status`.
    pub fn server_status(self, status: u16) -> Self {
        self.server.force_status(status);
        self
    }

    /// Makes the server answer diffs with undecodable bytes.
    pub fn malformed_diff(self) -> Self {
        self.server.serve_malformed_diffs();
        self
    }

    /// Publishes a podcast in the remote catalog.
    pub fn publish(self, podcast: Podcast, episodes: Vec<Episode>) -> Self {
        self.catalog.publish(podcast, episodes);
        self
    }

    /// Builds the entry point.
    ///
    /// # Panics
    ///
    /// Panics if the worker pool cannot be created.
    pub fn build(self) -> LoopbackYearSync {
        let transport = HttpTransport::new(
            &self.config,
            LoopbackClient::new(self.server),
            self.tokens,
        );
        YearSync::new(
            self.config,
            transport,
            CountingStore::new(self.store),
            self.catalog,
        )
        .expect("worker pool")
    }
}

/// Returns the server behind a scenario.
pub fn server_of(sync: &LoopbackYearSync) -> &HistoryServer {
    sync.transport().client().server()
}

/// Returns the local store behind a scenario.
pub fn store_of(sync: &LoopbackYearSync) -> &MemoryHistoryStore {
    sync.storage().inner()
}
