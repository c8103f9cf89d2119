//! # Yearsync Engine
//!
//! Reconciles locally recorded listening history for one calendar year with
//! the server's copy.
//!
//! This crate provides:
//! - The reconciliation session state machine (token → probe → pull →
//!   resolve → merge)
//! - A per-session existence cache
//! - Concurrent resolution of missing episodes on a fork/join worker pool
//! - Idempotent bulk merge of podcast listings
//! - HTTP transport abstraction with a loopback client for tests
//! - In-memory storage, catalog and transport collaborators
//!
//! ## Architecture
//!
//! A session uses a **probe-then-pull** model:
//! 1. Probe the server for the year's interaction count (cheap)
//! 2. Compare against the local count; stop if local is caught up
//! 3. Pull the full diff with the same token
//! 4. Create whatever the diff references but storage lacks, then refresh
//!    the listings of every podcast touched
//!
//! ## Key Invariants
//!
//! - At most two POSTs per session, and only one when local is caught up
//! - No POST is sent without a token
//! - A malformed diff writes nothing
//! - Lookup and merge failures never fail the session
//! - Merging the same listings twice leaves storage unchanged
//!
//! ## Usage
//!
//! ```
//! use yearsync_engine::{MemoryCatalog, MemoryHistoryStore, MockTransport, SyncConfig, YearSync};
//! use yearsync_protocol::ProbeResponse;
//!
//! let sync = YearSync::new(
//!     SyncConfig::new("https://api.example.com"),
//!     MockTransport::new(),
//!     MemoryHistoryStore::new(),
//!     MemoryCatalog::new(),
//! )
//! .unwrap();
//!
//! sync.transport().set_probe_response(Ok(ProbeResponse::new(0)));
//! assert!(sync.run(2024));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod catalog;
mod config;
mod error;
mod http;
mod merge;
mod model;
mod pool;
mod resolver;
mod session;
mod storage;
mod transport;
mod year_sync;

pub use cache::ExistenceCache;
pub use catalog::{MemoryCatalog, RemoteCatalog};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use http::{
    CborDecode, HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    StaticTokenProvider, TokenProvider,
};
pub use merge::{BulkMerge, MergeSummary};
pub use model::{interaction_time, AuthToken, Episode, Podcast, PodcastStub};
pub use pool::WorkerPool;
pub use resolver::{ConcurrentResolver, Resolution, StagedListings};
pub use session::{ReconciliationSession, SessionOutcome, SessionState, SessionSummary};
pub use storage::{HistoryStore, MemoryHistoryStore};
pub use transport::{HistoryTransport, MockTransport};
pub use year_sync::{SyncStats, YearSync};
