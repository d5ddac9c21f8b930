//! # SmartStore Testkit
//!
//! Testing utilities for the SmartStore client.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Clients over a temporary directory or in memory
//! - **Generators**: Proptest strategies for names, index specs and entries
//! - **Tracing**: A test-friendly subscriber setup
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use smartstore_testkit::generators::index_specs;
//!
//! proptest! {
//!     #[test]
//!     fn specs_survive_json(specs in index_specs()) {
//!         let json = serde_json::to_value(&specs).unwrap();
//!         prop_assert_eq!(IndexSpec::list_from_json(&json).unwrap(), specs);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use smartstore_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let store = fixture.sqlite.global_store("G1").await.unwrap();
//!     assert!(!store.soup_exists("X").await.unwrap());
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, test_user, TestFixture};
