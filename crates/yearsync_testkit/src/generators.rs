//! Property-based test generators using proptest.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use yearsync_engine::{Episode, StagedListings};
use yearsync_protocol::HistoryChange;

/// Strategy for episode ids drawn from a small pool, so duplicates occur.
pub fn episode_id_strategy() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|n| format!("ep-{n}"))
}

/// Strategy for podcast ids drawn from a small pool.
pub fn podcast_id_strategy() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|n| format!("pod-{n}"))
}

/// Strategy for epoch milliseconds falling inside `year` (UTC).
pub fn millis_in_year_strategy(year: i32) -> impl Strategy<Value = i64> {
    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp_millis())
        .unwrap_or(0);
    let end = Utc
        .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp_millis())
        .unwrap_or(start + 1);
    start..end
}

/// Strategy for a single change in `year`.
pub fn history_change_strategy(year: i32) -> impl Strategy<Value = HistoryChange> {
    (
        episode_id_strategy(),
        podcast_id_strategy(),
        millis_in_year_strategy(year),
    )
        .prop_map(|(episode, podcast, at)| HistoryChange::new(episode, podcast, at))
}

/// Strategy for a diff of up to `max` changes in `year`.
///
/// An episode always belongs to the same podcast across the diff.
pub fn history_changes_strategy(year: i32, max: usize) -> impl Strategy<Value = Vec<HistoryChange>> {
    prop::collection::vec(history_change_strategy(year), 0..=max).prop_map(|mut changes| {
        for change in &mut changes {
            let n: u32 = change
                .episode_id
                .strip_prefix("ep-")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            change.podcast_id = format!("pod-{}", n % 6);
        }
        changes
    })
}

/// Strategy for staged listings keyed by podcast id.
pub fn listing_strategy() -> impl Strategy<Value = StagedListings> {
    prop::collection::btree_map(
        podcast_id_strategy(),
        prop::collection::vec(("[a-z]{1,6}", "[A-Za-z ]{0,16}", 0u32..7200), 0..8),
        0..5,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(podcast_id, rows)| {
                let episodes = rows
                    .into_iter()
                    .map(|(slug, title, secs)| {
                        Episode::new(format!("{podcast_id}/{slug}"), &podcast_id, title)
                            .with_duration(secs)
                    })
                    .collect();
                (podcast_id, episodes)
            })
            .collect()
    })
}

/// Strategy for arbitrary response bodies.
pub fn body_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Datelike};

    proptest! {
        #[test]
        fn changes_fall_inside_the_year(change in history_change_strategy(2024)) {
            let at = DateTime::from_timestamp_millis(change.modified_at_millis).unwrap();
            prop_assert_eq!(at.year(), 2024);
        }

        #[test]
        fn episodes_keep_their_podcast(changes in history_changes_strategy(2024, 40)) {
            let mut owners = std::collections::HashMap::new();
            for change in &changes {
                let owner = owners.entry(change.episode_id.clone()).or_insert(change.podcast_id.clone());
                prop_assert_eq!(owner.as_str(), change.podcast_id.as_str());
            }
        }

        #[test]
        fn podcast_follows_the_episode_number(changes in history_changes_strategy(2024, 40)) {
            for change in &changes {
                let n: u32 = change.episode_id["ep-".len()..].parse().unwrap();
                prop_assert_eq!(&change.podcast_id, &format!("pod-{}", n % 6));
            }
        }
    }
}
