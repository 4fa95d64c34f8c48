//! Shortsmith Scene Model
//!
//! Defines the data contracts for a render request:
//! - **Request configs:** the loosely-typed JSON `config` field of an export request
//! - **Scene description:** the validated, immutable scene built from a config
//!   plus the uploaded media files
//! - **Colors and quality tiers:** typed style tokens shared by the compiler
//!
//! Positions in requests are percentages (`0..=100`) of the output frame so the
//! same scene renders at every quality tier.

pub mod color;
pub mod config;
pub mod quality;
pub mod scene;

pub use color::*;
pub use config::*;
pub use quality::*;
pub use scene::*;
