//! Configuration for the sync engine.

use std::time::Duration;
use yearsync_protocol::{HISTORY_YEAR_PATH, PROTOCOL_VERSION};

/// Configuration for year sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server URL (e.g. "https://api.example.com").
    pub server_url: String,
    /// Protocol version sent with each request.
    pub protocol_version: i32,
    /// Cap on concurrently running lookups. `None` means one unit per item.
    pub max_in_flight: Option<usize>,
    /// Time budget for each network phase. `None` blocks indefinitely.
    pub phase_timeout: Option<Duration>,
    /// Worker threads for the resolver runtime.
    pub worker_threads: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            protocol_version: PROTOCOL_VERSION,
            max_in_flight: None,
            phase_timeout: None,
            worker_threads: 2,
        }
    }

    /// Sets the protocol version.
    pub fn with_protocol_version(mut self, version: i32) -> Self {
        self.protocol_version = version;
        self
    }

    /// Caps the number of lookups in flight at once.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit.max(1));
        self
    }

    /// Sets a time budget for the probe and pull phases.
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = Some(timeout);
        self
    }

    /// Sets the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Returns the full URL of the year history endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            HISTORY_YEAR_PATH
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://api.example.com")
            .with_protocol_version(2)
            .with_max_in_flight(8)
            .with_phase_timeout(Duration::from_secs(15))
            .with_worker_threads(4);

        assert_eq!(config.server_url, "https://api.example.com");
        assert_eq!(config.protocol_version, 2);
        assert_eq!(config.max_in_flight, Some(8));
        assert_eq!(config.phase_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.worker_threads, 4);
    }

    #[test]
    fn defaults_preserve_unbounded_behaviour() {
        let config = SyncConfig::default();
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert!(config.max_in_flight.is_none());
        assert!(config.phase_timeout.is_none());
    }

    #[test]
    fn zero_limits_are_clamped() {
        let config = SyncConfig::default()
            .with_max_in_flight(0)
            .with_worker_threads(0);
        assert_eq!(config.max_in_flight, Some(1));
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        assert_eq!(
            SyncConfig::new("https://api.example.com/").endpoint_url(),
            "https://api.example.com/history/year"
        );
        assert_eq!(
            SyncConfig::new("https://api.example.com").endpoint_url(),
            "https://api.example.com/history/year"
        );
    }
}
