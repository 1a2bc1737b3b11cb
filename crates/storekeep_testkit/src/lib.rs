//! # Storekeep Testkit
//!
//! Test utilities for Storekeep.
//!
//! This crate provides:
//! - Fixtures: managers over a fresh [`storekeep_host::MemoryHost`], the
//!   usual collection configurations, JSON-to-record conversion
//! - Property-based test generators using proptest
//! - One-time tracing setup for test output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storekeep_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn stores_users() {
//!     let fixture = TestManager::new();
//!     fixture.db.create_collection("users", users_collection()).await.unwrap();
//!     fixture.db.put("users", record(json!({"email": "a@x.com"})), None).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use serde_json::json;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
