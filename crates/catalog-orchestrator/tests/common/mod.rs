//! Shared test utilities for catalog-orchestrator integration tests.
//!
//! This module provides:
//! - `TestHarness`: an orchestrator over a temp-dir database and a manual clock
//! - scripted fakes for every external service
//! - builders for queue messages and stage results

#![allow(dead_code)]

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
