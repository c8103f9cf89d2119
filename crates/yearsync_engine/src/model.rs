//! Local entities touched by a year sync.

use chrono::{DateTime, Utc};
use std::fmt;

/// A podcast (the parent entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Podcast {
    /// Stable external id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Author or network.
    pub author: String,
    /// Whether the user follows this podcast.
    pub subscribed: bool,
}

impl Podcast {
    /// Creates an unsubscribed podcast.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: String::new(),
            subscribed: false,
        }
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Marks the podcast as subscribed.
    pub fn subscribed(mut self) -> Self {
        self.subscribed = true;
        self
    }
}

/// An episode (the child entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    /// Stable external id.
    pub id: String,
    /// Podcast this episode belongs to.
    pub podcast_id: String,
    /// Display title.
    pub title: String,
    /// Publication time, when known.
    pub published_at: Option<DateTime<Utc>>,
    /// Duration in seconds.
    pub duration_secs: u32,
}

impl Episode {
    /// Creates an episode.
    pub fn new(
        id: impl Into<String>,
        podcast_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            podcast_id: podcast_id.into(),
            title: title.into(),
            published_at: None,
            duration_secs: 0,
        }
    }

    /// Sets the publication time.
    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }
}

/// Minimal podcast + episode pair fetched to satisfy a history reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastStub {
    /// The podcast, inserted only if absent locally.
    pub podcast: Podcast,
    /// The episode referenced by the history change.
    pub episode: Episode,
}

/// Bearer token for the history endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Converts epoch millis from the wire into a local timestamp.
pub fn interaction_time(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
