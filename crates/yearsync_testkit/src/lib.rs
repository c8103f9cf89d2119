//! # Yearsync Testkit
//!
//! Test utilities for yearsync.
//!
//! This crate provides:
//! - An in-process history server speaking the real CBOR wire format
//! - Scenario builders wiring the engine to that server over loopback
//! - A storage wrapper that counts existence queries and writes
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use yearsync_testkit::prelude::*;
//!
//! #[test]
//! fn caught_up() {
//!     let sync = Scenario::new()
//!         .local_interactions(2024, 3)
//!         .remote_count(2024, 3)
//!         .build();
//!     assert!(sync.run(2024));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;

/// Installs a test-friendly tracing subscriber.
///
/// Honours `RUST_LOG` and falls back to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
