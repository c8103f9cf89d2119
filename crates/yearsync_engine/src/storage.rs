//! Local storage seam and an in-memory implementation.

use crate::error::{SyncError, SyncResult};
use crate::model::{Episode, Podcast};
use chrono::{DateTime, Datelike, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Local listening-history storage.
///
/// Implementations must tolerate concurrent reads and upserts from the
/// resolver's worker tasks.
pub trait HistoryStore: Send + Sync {
    /// Counts episodes whose last recorded interaction falls in `year`.
    fn count_interactions_for_year(&self, year: i32) -> SyncResult<i64>;

    /// Checks whether an episode exists locally.
    fn episode_exists(&self, episode_id: &str) -> SyncResult<bool>;

    /// Records the last interaction time for an episode.
    ///
    /// Writing the same timestamp twice leaves the same stored value.
    fn record_interaction(&self, episode_id: &str, at: DateTime<Utc>) -> SyncResult<()>;

    /// Upserts episodes of a podcast, keyed by episode id.
    fn upsert_episodes(&self, podcast_id: &str, episodes: &[Episode]) -> SyncResult<()>;

    /// Finds a podcast by external id.
    ///
    /// Unsubscribed podcasts are only returned when `include_unsubscribed` is set.
    fn find_podcast(&self, podcast_id: &str, include_unsubscribed: bool)
        -> SyncResult<Option<Podcast>>;

    /// Inserts a podcast.
    fn insert_podcast(&self, podcast: &Podcast) -> SyncResult<()>;
}

#[derive(Default)]
struct StoreState {
    podcasts: HashMap<String, Podcast>,
    episodes: HashMap<String, Episode>,
    interactions: HashMap<String, DateTime<Utc>>,
}

/// An in-memory history store.
///
/// Interaction times are kept apart from episode metadata so that listing
/// upserts never overwrite them.
#[derive(Default)]
pub struct MemoryHistoryStore {
    state: RwLock<StoreState>,
    fail_upserts_for: RwLock<Vec<String>>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a podcast.
    pub fn add_podcast(&self, podcast: Podcast) {
        self.state.write().podcasts.insert(podcast.id.clone(), podcast);
    }

    /// Seeds an episode.
    pub fn add_episode(&self, episode: Episode) {
        self.state.write().episodes.insert(episode.id.clone(), episode);
    }

    /// Seeds an interaction.
    pub fn add_interaction(&self, episode_id: impl Into<String>, at: DateTime<Utc>) {
        self.state.write().interactions.insert(episode_id.into(), at);
    }

    /// Makes episode upserts for `podcast_id` fail.
    pub fn fail_upserts_for(&self, podcast_id: impl Into<String>) {
        self.fail_upserts_for.write().push(podcast_id.into());
    }

    /// Returns a podcast regardless of subscription.
    pub fn podcast(&self, podcast_id: &str) -> Option<Podcast> {
        self.state.read().podcasts.get(podcast_id).cloned()
    }

    /// Returns an episode.
    pub fn episode(&self, episode_id: &str) -> Option<Episode> {
        self.state.read().episodes.get(episode_id).cloned()
    }

    /// Returns the last interaction recorded for an episode.
    pub fn interaction(&self, episode_id: &str) -> Option<DateTime<Utc>> {
        self.state.read().interactions.get(episode_id).copied()
    }

    /// Returns the episodes of a podcast, sorted by id.
    pub fn episodes_of(&self, podcast_id: &str) -> Vec<Episode> {
        let mut episodes: Vec<Episode> = self
            .state
            .read()
            .episodes
            .values()
            .filter(|e| e.podcast_id == podcast_id)
            .cloned()
            .collect();
        episodes.sort_by(|a, b| a.id.cmp(&b.id));
        episodes
    }

    /// Returns (podcasts, episodes, interactions) counts.
    pub fn sizes(&self) -> (usize, usize, usize) {
        let state = self.state.read();
        (
            state.podcasts.len(),
            state.episodes.len(),
            state.interactions.len(),
        )
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn count_interactions_for_year(&self, year: i32) -> SyncResult<i64> {
        let count = self
            .state
            .read()
            .interactions
            .values()
            .filter(|at| at.year() == year)
            .count();
        Ok(count as i64)
    }

    fn episode_exists(&self, episode_id: &str) -> SyncResult<bool> {
        Ok(self.state.read().episodes.contains_key(episode_id))
    }

    fn record_interaction(&self, episode_id: &str, at: DateTime<Utc>) -> SyncResult<()> {
        self.state
            .write()
            .interactions
            .insert(episode_id.to_string(), at);
        Ok(())
    }

    fn upsert_episodes(&self, podcast_id: &str, episodes: &[Episode]) -> SyncResult<()> {
        if self.fail_upserts_for.read().iter().any(|p| p == podcast_id) {
            return Err(SyncError::storage(format!(
                "episode table locked for podcast {podcast_id}"
            )));
        }

        let mut state = self.state.write();
        for episode in episodes {
            let mut stored = episode.clone();
            stored.podcast_id = podcast_id.to_string();
            state.episodes.insert(stored.id.clone(), stored);
        }
        Ok(())
    }

    fn find_podcast(
        &self,
        podcast_id: &str,
        include_unsubscribed: bool,
    ) -> SyncResult<Option<Podcast>> {
        Ok(self
            .state
            .read()
            .podcasts
            .get(podcast_id)
            .filter(|p| include_unsubscribed || p.subscribed)
            .cloned())
    }

    fn insert_podcast(&self, podcast: &Podcast) -> SyncResult<()> {
        self.state
            .write()
            .podcasts
            .entry(podcast.id.clone())
            .or_insert_with(|| podcast.clone());
        Ok(())
    }
}
