//! Shared persistence contract tests.
//!
//! Tests the JournalBackend and SnapshotBackend interfaces against every
//! DocumentStore implementation. Each implementation binary imports these
//! test functions and runs them through the runner macros.

pub mod journal_tests;
pub mod snapshot_tests;
