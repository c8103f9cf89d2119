//! Remote podcast catalog lookups.

use crate::error::{SyncError, SyncResult};
use crate::model::{Episode, Podcast, PodcastStub};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Remote lookups used to fill in entities referenced by history.
pub trait RemoteCatalog: Send + Sync {
    /// Fetches the podcast and episode referenced by a history change.
    fn fetch_stub(&self, episode_id: &str, podcast_id: &str) -> SyncResult<PodcastStub>;

    /// Fetches the full episode listing of a podcast.
    fn fetch_episodes(&self, podcast_id: &str) -> SyncResult<Vec<Episode>>;
}

/// An in-memory catalog for testing.
#[derive(Default)]
pub struct MemoryCatalog {
    podcasts: RwLock<HashMap<String, Podcast>>,
    episodes: RwLock<HashMap<String, Vec<Episode>>>,
    unavailable: RwLock<Vec<String>>,
    failing_listings: RwLock<Vec<String>>,
    stub_fetches: AtomicU64,
    listing_fetches: AtomicU64,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a podcast with its episodes.
    pub fn publish(&self, podcast: Podcast, episodes: Vec<Episode>) {
        self.episodes.write().insert(podcast.id.clone(), episodes);
        self.podcasts.write().insert(podcast.id.clone(), podcast);
    }

    /// Makes every lookup touching `id` (episode or podcast) fail.
    pub fn make_unavailable(&self, id: impl Into<String>) {
        self.unavailable.write().push(id.into());
    }

    /// Makes only listing lookups for `podcast_id` fail.
    pub fn fail_listing(&self, podcast_id: impl Into<String>) {
        self.failing_listings.write().push(podcast_id.into());
    }

    /// Number of stub lookups served or attempted.
    pub fn stub_fetches(&self) -> u64 {
        self.stub_fetches.load(Ordering::SeqCst)
    }

    /// Number of listing lookups served or attempted.
    pub fn listing_fetches(&self) -> u64 {
        self.listing_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self, id: &str) -> SyncResult<()> {
        if self.unavailable.read().iter().any(|u| u == id) {
            return Err(SyncError::lookup(id, "catalog unavailable"));
        }
        Ok(())
    }
}

impl RemoteCatalog for MemoryCatalog {
    fn fetch_stub(&self, episode_id: &str, podcast_id: &str) -> SyncResult<PodcastStub> {
        self.stub_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available(episode_id)?;
        self.check_available(podcast_id)?;

        let podcast = self
            .podcasts
            .read()
            .get(podcast_id)
            .cloned()
            .ok_or_else(|| SyncError::lookup(podcast_id, "podcast not found"))?;

        let episode = self
            .episodes
            .read()
            .get(podcast_id)
            .and_then(|episodes| episodes.iter().find(|e| e.id == episode_id).cloned())
            .ok_or_else(|| SyncError::lookup(episode_id, "episode not found"))?;

        Ok(PodcastStub { podcast, episode })
    }

    fn fetch_episodes(&self, podcast_id: &str) -> SyncResult<Vec<Episode>> {
        self.listing_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available(podcast_id)?;
        if self.failing_listings.read().iter().any(|p| p == podcast_id) {
            return Err(SyncError::lookup(podcast_id, "listing request failed"));
        }

        self.episodes
            .read()
            .get(podcast_id)
            .cloned()
            .ok_or_else(|| SyncError::lookup(podcast_id, "podcast not found"))
    }
}
