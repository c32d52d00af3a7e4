//! Shared test utilities for vidpipe integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an in-memory store to scripted gateways
//! - In-memory fakes for every remote collaborator
//! - Builders for videos, settings and queue configuration

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
