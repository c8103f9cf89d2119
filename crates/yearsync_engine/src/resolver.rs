//! Concurrent resolution of episodes referenced by a year diff.
//!
//! Resolution runs in two fork/join rounds:
//! 1. every missing episode gets its podcast and episode created from a
//!    remote stub, and its interaction recorded;
//! 2. every podcast touched in round one gets its full listing fetched.
//!
//! Individual lookup failures are logged and dropped. Neither round can
//! fail the session.

use crate::cache::ExistenceCache;
use crate::catalog::RemoteCatalog;
use crate::error::{SyncError, SyncResult};
use crate::model::{interaction_time, Episode};
use crate::pool::WorkerPool;
use crate::storage::HistoryStore;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use yearsync_protocol::HistoryChange;

/// Listings staged for merge, keyed by podcast id.
pub type StagedListings = BTreeMap<String, Vec<Episode>>;

/// Outcome of a resolution pass.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Podcasts whose listing needs refreshing, deduplicated.
    pub refresh: BTreeSet<String>,
    /// Listings fetched for the refresh set.
    pub listings: StagedListings,
    /// Changes whose episode already existed.
    pub already_present: usize,
    /// Distinct missing episodes dispatched for resolution.
    pub missing: usize,
    /// Missing episodes created and recorded.
    pub resolved: usize,
    /// Missing episodes that failed to resolve, including lost workers.
    pub lookup_failures: usize,
    /// Podcasts whose listing could not be fetched.
    pub listing_failures: usize,
}

/// Resolves missing episodes and stages podcast listings.
pub struct ConcurrentResolver<'a, S, L> {
    storage: Arc<S>,
    catalog: Arc<L>,
    pool: &'a WorkerPool,
}

impl<'a, S, L> ConcurrentResolver<'a, S, L>
where
    S: HistoryStore + 'static,
    L: RemoteCatalog + 'static,
{
    /// Creates a resolver.
    pub fn new(storage: Arc<S>, catalog: Arc<L>, pool: &'a WorkerPool) -> Self {
        Self {
            storage,
            catalog,
            pool,
        }
    }

    /// Runs both resolution rounds over `changes`.
    ///
    /// `cache` is read and populated on the calling thread only.
    pub fn resolve(&self, changes: Vec<HistoryChange>, cache: &mut ExistenceCache) -> Resolution {
        let mut resolution = Resolution::default();

        let missing = self.partition(changes, cache, &mut resolution);
        resolution.missing = missing.len();

        for joined in self.resolve_missing(missing) {
            match joined {
                Ok((episode_id, Ok(podcast_id))) => {
                    cache.mark_present(episode_id);
                    resolution.refresh.insert(podcast_id);
                    resolution.resolved += 1;
                }
                Ok((episode_id, Err(e))) => {
                    warn!(episode = %episode_id, error = %e, "dropping unresolved history item");
                    resolution.lookup_failures += 1;
                }
                Err(e) => {
                    warn!(error = %e, "resolver worker lost");
                    resolution.lookup_failures += 1;
                }
            }
        }

        for outcome in self.fetch_listings(&resolution.refresh) {
            match outcome {
                Ok((podcast_id, episodes)) => {
                    resolution.listings.insert(podcast_id, episodes);
                }
                Err(e) => {
                    warn!(error = %e, "skipping listing refresh");
                    resolution.listing_failures += 1;
                }
            }
        }

        debug!(
            present = resolution.already_present,
            missing = resolution.missing,
            resolved = resolution.resolved,
            refresh = resolution.refresh.len(),
            staged = resolution.listings.len(),
            "resolution complete"
        );
        resolution
    }

    /// Splits changes into present and missing, deduplicating missing ones.
    ///
    /// When an episode appears more than once, the latest interaction wins.
    fn partition(
        &self,
        changes: Vec<HistoryChange>,
        cache: &mut ExistenceCache,
        resolution: &mut Resolution,
    ) -> Vec<HistoryChange> {
        let mut order: Vec<String> = Vec::new();
        let mut missing: HashMap<String, HistoryChange> = HashMap::new();

        for change in changes {
            let present = cache
                .exists(&change.episode_id, |id| self.storage.episode_exists(id))
                .unwrap_or_else(|e| {
                    warn!(episode = %change.episode_id, error = %e, "existence check failed, treating as missing");
                    false
                });

            if present {
                resolution.already_present += 1;
                continue;
            }

            match missing.get_mut(&change.episode_id) {
                Some(seen) => {
                    if change.modified_at_millis > seen.modified_at_millis {
                        *seen = change;
                    }
                }
                None => {
                    order.push(change.episode_id.clone());
                    missing.insert(change.episode_id.clone(), change);
                }
            }
        }

        order
            .into_iter()
            .filter_map(|id| missing.remove(&id))
            .collect()
    }

    fn resolve_missing(
        &self,
        missing: Vec<HistoryChange>,
    ) -> Vec<SyncResult<(String, SyncResult<String>)>> {
        let storage = Arc::clone(&self.storage);
        let catalog = Arc::clone(&self.catalog);

        self.pool.fork_join(missing, move |change: HistoryChange| {
            let outcome = create_from_stub(storage.as_ref(), catalog.as_ref(), &change);
            Ok((change.episode_id, outcome))
        })
    }

    fn fetch_listings(&self, refresh: &BTreeSet<String>) -> Vec<SyncResult<(String, Vec<Episode>)>> {
        let catalog = Arc::clone(&self.catalog);
        let podcasts: Vec<String> = refresh.iter().cloned().collect();

        self.pool.fork_join(podcasts, move |podcast_id: String| {
            let episodes = catalog.fetch_episodes(&podcast_id)?;
            Ok((podcast_id, episodes))
        })
    }
}

/// Creates the podcast (if absent) and episode for one missing change, then
/// records its interaction. Returns the podcast id to refresh.
fn create_from_stub<S, L>(storage: &S, catalog: &L, change: &HistoryChange) -> SyncResult<String>
where
    S: HistoryStore + ?Sized,
    L: RemoteCatalog + ?Sized,
{
    let at = interaction_time(change.modified_at_millis).ok_or_else(|| {
        SyncError::lookup(
            &change.episode_id,
            format!("timestamp {} out of range", change.modified_at_millis),
        )
    })?;

    let stub = catalog.fetch_stub(&change.episode_id, &change.podcast_id)?;

    if storage.find_podcast(&change.podcast_id, true)?.is_none() {
        let mut podcast = stub.podcast;
        podcast.id = change.podcast_id.clone();
        podcast.subscribed = false;
        storage.insert_podcast(&podcast)?;
    }

    storage.upsert_episodes(&change.podcast_id, &[stub.episode])?;
    storage.record_interaction(&change.episode_id, at)?;

    Ok(change.podcast_id.clone())
}
