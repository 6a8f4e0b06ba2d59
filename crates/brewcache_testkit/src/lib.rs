//! # brewcache testkit
//!
//! Test utilities for brewcache.
//!
//! This crate provides:
//! - A `Recipe` record and ready-made repositories over memory or file stores
//! - `ScriptedRemote`, a remote whose answers are scripted per call or per id
//! - `FlakyStore`, a store wrapper that injects storage failures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use brewcache_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn creates_offline() {
//!     let t = TestRepo::new();
//!     let recipe = t.create(Recipe::named(OWNER, "IPA")).await.unwrap();
//!     assert!(recipe.id.starts_with("temp_"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod flaky;
pub mod generators;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::flaky::*;
    pub use crate::generators::*;
    pub use crate::scripted::*;
    pub use brewcache_core::ManualClock;
}

pub use fixtures::*;
pub use flaky::*;
pub use generators::*;
pub use scripted::*;
