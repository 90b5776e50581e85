//! Shared test utilities for jobdeck integration tests.
//!
//! This module provides:
//! - Builders for job records, topologies and configs
//! - `TestHarness` for config files in temp directories

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
