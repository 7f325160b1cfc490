//! Shared utilities for fileparse integration tests.
//!
//! - `TestHarness`: an engine wired to a temporary upload directory and a
//!   chosen repository backend
//! - fixture builders for CSV and PDF uploads

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::{events_for, Backend, TestHarness};
