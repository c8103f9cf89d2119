//! Protocol messages for year history sync.
//!
//! Both phases talk to the same endpoint. The request is identical apart from
//! `count_only`; the response shape depends on it.

use crate::codec::{from_cbor, to_cbor};
use crate::error::{CodecError, CodecResult};
use crate::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};

/// Request for a year's listening history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Device wall-clock time when the request was built, in epoch millis.
    pub device_time_millis: i64,
    /// Protocol version.
    pub version: i32,
    /// Calendar year being reconciled.
    pub year: i32,
    /// When true the server only returns the number of recorded interactions.
    pub count_only: bool,
}

impl SyncRequest {
    /// Creates a count-only probe request.
    pub fn probe(year: i32, device_time_millis: i64) -> Self {
        Self {
            device_time_millis,
            version: PROTOCOL_VERSION,
            year,
            count_only: true,
        }
    }

    /// Creates a full diff request.
    pub fn diff(year: i32, device_time_millis: i64) -> Self {
        Self {
            count_only: false,
            ..Self::probe(year, device_time_millis)
        }
    }

    /// Overrides the protocol version.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

/// Response to a count-only probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Number of interactions the server holds for the requested year.
    #[serde(default)]
    pub count: i64,
}

impl ProbeResponse {
    /// Creates a probe response.
    pub fn new(count: i64) -> Self {
        Self { count }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    ///
    /// A negative count is rejected.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let response: Self = from_cbor(bytes)?;
        if response.count < 0 {
            return Err(CodecError::invalid_field(
                "count",
                format!("negative count {}", response.count),
            ));
        }
        Ok(response)
    }
}

/// One remote listening interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryChange {
    /// Episode the interaction belongs to.
    #[serde(rename = "episode")]
    pub episode_id: String,
    /// Podcast the episode belongs to.
    #[serde(rename = "podcast")]
    pub podcast_id: String,
    /// When the interaction happened, in epoch millis.
    #[serde(rename = "modifiedAt")]
    pub modified_at_millis: i64,
}

impl HistoryChange {
    /// Creates a history change.
    pub fn new(
        episode_id: impl Into<String>,
        podcast_id: impl Into<String>,
        modified_at_millis: i64,
    ) -> Self {
        Self {
            episode_id: episode_id.into(),
            podcast_id: podcast_id.into(),
            modified_at_millis,
        }
    }
}

/// The `history` envelope of a diff response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Changes in server order.
    #[serde(default)]
    pub changes: Vec<HistoryChange>,
}

/// Response to a full diff request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResponse {
    /// The year's history.
    #[serde(default)]
    pub history: HistoryPage,
}

impl DiffResponse {
    /// Creates a diff response from changes in server order.
    pub fn new(changes: Vec<HistoryChange>) -> Self {
        Self {
            history: HistoryPage { changes },
        }
    }

    /// Returns the changes in server order.
    pub fn changes(&self) -> &[HistoryChange] {
        &self.history.changes
    }

    /// Consumes the response, yielding its changes.
    pub fn into_changes(self) -> Vec<HistoryChange> {
        self.history.changes
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Loose view of an encoded message, for checking wire names.
    fn field_names(bytes: &[u8]) -> Vec<String> {
        let map: BTreeMap<String, ciborium::Value> = from_cbor(bytes).unwrap();
        map.into_keys().collect()
    }

    #[test]
    fn probe_and_diff_differ_only_in_count_only() {
        let probe = SyncRequest::probe(2023, 1_000);
        let diff = SyncRequest::diff(2023, 1_000);

        assert!(probe.count_only);
        assert!(!diff.count_only);
        assert_eq!(probe.year, diff.year);
        assert_eq!(probe.version, PROTOCOL_VERSION);
        assert_eq!(probe.device_time_millis, diff.device_time_millis);
    }

    #[test]
    fn request_uses_wire_field_names() {
        let bytes = SyncRequest::probe(2023, 42).encode().unwrap();
        assert_eq!(
            field_names(&bytes),
            vec!["countOnly", "deviceTimeMillis", "version", "year"]
        );
    }

    #[test]
    fn diff_response_uses_wire_field_names() {
        let response = DiffResponse::new(vec![HistoryChange::new("ep-1", "pod-1", 99)]);
        let bytes = response.encode().unwrap();

        let value: ciborium::Value = from_cbor(&bytes).unwrap();
        let history = value
            .as_map()
            .and_then(|m| m.iter().find(|(k, _)| k.as_text() == Some("history")))
            .map(|(_, v)| v.clone())
            .expect("history field");
        let changes = history
            .as_map()
            .and_then(|m| m.iter().find(|(k, _)| k.as_text() == Some("changes")))
            .and_then(|(_, v)| v.as_array().cloned())
            .expect("changes field");
        let first = changes[0].as_map().expect("change map");
        let names: Vec<&str> = first.iter().filter_map(|(k, _)| k.as_text()).collect();

        assert_eq!(names, vec!["episode", "podcast", "modifiedAt"]);
    }

    #[test]
    fn diff_response_preserves_server_order() {
        let response = DiffResponse::new(vec![
            HistoryChange::new("ep-3", "pod-1", 30),
            HistoryChange::new("ep-1", "pod-2", 10),
            HistoryChange::new("ep-2", "pod-1", 20),
        ]);
        let decoded = DiffResponse::decode(&response.encode().unwrap()).unwrap();

        let ids: Vec<&str> = decoded
            .changes()
            .iter()
            .map(|c| c.episode_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ep-3", "ep-1", "ep-2"]);
    }

    #[test]
    fn absent_fields_decode_to_zero_values() {
        let empty_map = to_cbor(&BTreeMap::<String, i64>::new()).unwrap();

        assert_eq!(ProbeResponse::decode(&empty_map).unwrap().count, 0);
        assert!(DiffResponse::decode(&empty_map).unwrap().changes().is_empty());
    }

    #[test]
    fn negative_probe_count_is_rejected() {
        let bytes = ProbeResponse::new(-3).encode().unwrap();
        let result = ProbeResponse::decode(&bytes);
        assert!(matches!(
            result,
            Err(CodecError::InvalidField { field: "count", .. })
        ));
    }

    #[test]
    fn mistyped_change_is_rejected() {
        let mut bad = BTreeMap::new();
        bad.insert("history", "not a map");
        let bytes = to_cbor(&bad).unwrap();
        assert!(DiffResponse::decode(&bytes).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ProbeResponse::decode(b"\xff\xff\xff").is_err());
        assert!(DiffResponse::decode(b"\xff\xff\xff").is_err());
    }
}
