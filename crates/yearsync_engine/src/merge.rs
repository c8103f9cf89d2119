//! Bulk merge of staged podcast listings into local storage.

use crate::error::SyncError;
use crate::resolver::StagedListings;
use crate::storage::HistoryStore;
use tracing::{debug, warn};

/// Totals from one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Podcasts whose listing was written.
    pub podcasts_merged: usize,
    /// Episodes written.
    pub episodes_upserted: usize,
    /// Podcasts whose write failed.
    pub failures: usize,
}

/// Writes staged listings with idempotent per-episode upserts.
///
/// There is no rollback: a failed podcast is logged and skipped, and the
/// podcasts already written stay written.
pub struct BulkMerge<'a, S: ?Sized> {
    storage: &'a S,
}

impl<'a, S: HistoryStore + ?Sized> BulkMerge<'a, S> {
    /// Creates a merge over `storage`.
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Upserts every staged listing.
    pub fn apply(&self, listings: &StagedListings) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for (podcast_id, episodes) in listings {
            match self.storage.upsert_episodes(podcast_id, episodes) {
                Ok(()) => {
                    summary.podcasts_merged += 1;
                    summary.episodes_upserted += episodes.len();
                }
                Err(e) => {
                    let err = SyncError::Merge {
                        podcast_id: podcast_id.clone(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "listing not merged");
                    summary.failures += 1;
                }
            }
        }

        debug!(
            podcasts = summary.podcasts_merged,
            episodes = summary.episodes_upserted,
            failures = summary.failures,
            "merge complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Episode;
    use crate::storage::MemoryHistoryStore;
    use chrono::{TimeZone, Utc};

    fn listings() -> StagedListings {
        let mut listings = StagedListings::new();
        listings.insert(
            "pod-1".into(),
            vec![
                Episode::new("ep-1", "pod-1", "One"),
                Episode::new("ep-2", "pod-1", "Two"),
            ],
        );
        listings.insert("pod-2".into(), vec![Episode::new("ep-9", "pod-2", "Nine")]);
        listings
    }

    #[test]
    fn merges_every_listing() {
        let store = MemoryHistoryStore::new();
        let summary = BulkMerge::new(&store).apply(&listings());

        assert_eq!(summary.podcasts_merged, 2);
        assert_eq!(summary.episodes_upserted, 3);
        assert_eq!(store.episodes_of("pod-1").len(), 2);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let store = MemoryHistoryStore::new();
        let merge = BulkMerge::new(&store);

        merge.apply(&listings());
        let once = (store.sizes(), store.episodes_of("pod-1"));
        merge.apply(&listings());
        let twice = (store.sizes(), store.episodes_of("pod-1"));

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_does_not_touch_interactions() {
        let store = MemoryHistoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        store.add_interaction("ep-1", at);

        BulkMerge::new(&store).apply(&listings());
        assert_eq!(store.interaction("ep-1"), Some(at));
    }

    #[test]
    fn failed_podcast_keeps_earlier_writes() {
        let store = MemoryHistoryStore::new();
        store.fail_upserts_for("pod-2");

        let summary = BulkMerge::new(&store).apply(&listings());

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.podcasts_merged, 1);
        assert_eq!(store.episodes_of("pod-1").len(), 2);
        assert!(store.episodes_of("pod-2").is_empty());
    }
}
