//! Per-session memo of episodes known to exist locally.

use crate::error::SyncResult;
use std::collections::HashSet;

/// Remembers episodes confirmed to exist during one session.
///
/// Only positives are cached. A negative answer is re-queried every time,
/// since the same session may create the episode later on.
///
/// The cache is owned by a single session and populated from the
/// orchestrating thread only; it is not shared with worker tasks.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    known: HashSet<String>,
    storage_queries: u64,
}

impl ExistenceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `episode_id` exists, consulting `query` on a miss.
    ///
    /// A storage error is returned as-is and nothing is cached.
    pub fn exists<F>(&mut self, episode_id: &str, query: F) -> SyncResult<bool>
    where
        F: FnOnce(&str) -> SyncResult<bool>,
    {
        if self.known.contains(episode_id) {
            return Ok(true);
        }

        self.storage_queries += 1;
        let present = query(episode_id)?;
        if present {
            self.known.insert(episode_id.to_string());
        }
        Ok(present)
    }

    /// Records an episode the session has just written to storage.
    pub fn mark_present(&mut self, episode_id: impl Into<String>) {
        self.known.insert(episode_id.into());
    }

    /// Returns true if `episode_id` is cached as present.
    pub fn contains(&self, episode_id: &str) -> bool {
        self.known.contains(episode_id)
    }

    /// Number of cached positives.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Number of times storage was consulted.
    pub fn storage_queries(&self) -> u64 {
        self.storage_queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::cell::Cell;

    #[test]
    fn positives_are_queried_once() {
        let mut cache = ExistenceCache::new();
        let calls = Cell::new(0);
        let query = |_: &str| -> SyncResult<bool> {
            calls.set(calls.get() + 1);
            Ok(true)
        };

        assert!(cache.exists("ep-1", query).unwrap());
        assert!(cache.exists("ep-1", query).unwrap());
        assert!(cache.exists("ep-1", query).unwrap());

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.storage_queries(), 1);
        assert!(cache.contains("ep-1"));
    }

    #[test]
    fn negatives_are_never_cached() {
        let mut cache = ExistenceCache::new();
        let calls = Cell::new(0);
        let query = |_: &str| -> SyncResult<bool> {
            calls.set(calls.get() + 1);
            Ok(false)
        };

        assert!(!cache.exists("ep-1", query).unwrap());
        assert!(!cache.exists("ep-1", query).unwrap());

        assert_eq!(calls.get(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn absence_can_turn_into_presence() {
        let mut cache = ExistenceCache::new();
        assert!(!cache.exists("ep-1", |_| Ok(false)).unwrap());
        assert!(cache.exists("ep-1", |_| Ok(true)).unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn storage_errors_are_not_cached() {
        let mut cache = ExistenceCache::new();
        let result = cache.exists("ep-1", |_| Err(SyncError::storage("busy")));
        assert!(result.is_err());
        assert!(!cache.contains("ep-1"));
    }

    #[test]
    fn marked_entries_skip_storage() {
        let mut cache = ExistenceCache::new();
        cache.mark_present("ep-7");
        let result = cache.exists("ep-7", |_| panic!("storage must not be queried"));
        assert!(result.unwrap());
        assert_eq!(cache.storage_queries(), 0);
    }
}
