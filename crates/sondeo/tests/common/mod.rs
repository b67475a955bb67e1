//! Shared test utilities for sondeo integration tests.
//!
//! - `TestHarness`: a temporary workspace with shell scripts standing in for
//!   the collectors, the preprocessing phase and the analyzers
//! - `ConfigBuilder`: programmatic `Config` construction

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{RecordingProgress, StubInterpreter, TestHarness};
