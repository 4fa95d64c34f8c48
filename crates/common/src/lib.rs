//! Shortsmith Common Utilities
//!
//! Shared infrastructure for all Shortsmith crates:
//! - Error types and result aliases
//! - Job clock and engine timecode helpers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
