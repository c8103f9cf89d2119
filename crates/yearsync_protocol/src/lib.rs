//! # Yearsync Protocol
//!
//! Wire types and CBOR codec for year listening-history sync.
//!
//! This crate provides:
//! - `SyncRequest` for both the count probe and the diff pull
//! - `ProbeResponse` and `DiffResponse` for the two response shapes
//! - `HistoryChange` records carried by a diff
//! - CBOR encoding/decoding through serde
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Usage
//!
//! ```
//! use yearsync_protocol::{ProbeResponse, SyncRequest};
//!
//! let request = SyncRequest::probe(2024, 1_700_000_000_000);
//! let bytes = request.encode().unwrap();
//! assert!(!bytes.is_empty());
//!
//! let response = ProbeResponse::new(12);
//! let decoded = ProbeResponse::decode(&response.encode().unwrap()).unwrap();
//! assert_eq!(decoded.count, 12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;

pub use codec::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use messages::{DiffResponse, HistoryChange, HistoryPage, ProbeResponse, SyncRequest};

/// Protocol version sent with every request.
pub const PROTOCOL_VERSION: i32 = 1;

/// Path of the year history endpoint, relative to the server URL.
pub const HISTORY_YEAR_PATH: &str = "/history/year";
