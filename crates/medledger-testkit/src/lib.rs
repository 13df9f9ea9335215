//! # Medledger Testkit
//!
//! Testing utilities for the medledger consent & audit ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Digest vectors**: Known payloads with reordered and altered variants,
//!   verifying canonicalization without pinning implementation hashes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up ledger scenarios
//!
//! ## Test Fixtures
//!
//! Quickly set up an in-memory ledger:
//!
//! ```rust,ignore
//! use medledger_testkit::fixtures::TestLedger;
//!
//! let fixture = TestLedger::new();
//! let patient = TestLedger::patient(1);
//! let grant = fixture.seed_active_grant(&patient, &TestLedger::doctor(1)).await?;
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use medledger_testkit::generators::{consent_actions, metadata_value};
//!
//! proptest! {
//!     #[test]
//!     fn digests_deterministic(v in metadata_value()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::TestLedger;
pub use generators::{consent_actions, ConsentAction};
pub use vectors::{all_vectors, verify_all_vectors, DigestVector};
