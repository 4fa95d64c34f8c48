//! Shortsmith Render Engine
//!
//! Compiles a validated scene into an ffmpeg filter program, assembles the
//! engine command and supervises the engine process until the output is
//! written and every request file is cleaned up.
//!
//! # Pipeline Architecture
//!
//! ```text
//! SceneDescription ──┐
//!                    ├── probe (audio presence, duration)
//! uploaded files ────┘         │
//!                              ├── compile: layout + style + subtitles
//!                              │        │
//!                              │        ▼
//!                              │   FilterProgram (typed labels, linted)
//!                              │        │
//!                              ├── assemble: inputs, maps, codec args
//!                              │        │
//!                              │        ▼
//!                              └── supervise: spawn, progress, stderr tail
//!                                       │
//!                                       ▼
//!                                  output.mp4 (+ .srt, debug report)
//! ```

pub mod command;
pub mod compiler;
pub mod export;
pub mod graph;
pub mod job;
pub mod layout;
pub mod probe;
pub mod quality;
pub mod style;
pub mod subtitles;
pub mod supervisor;

pub use command::{assemble, EngineCommand, InputSpec};
pub use compiler::{compile_scene, CompiledScene, Timeline};
pub use export::*;
pub use job::{RenderJob, TempFiles};
pub use style::StyleResolver;
pub use supervisor::{EngineProgress, ProcessSupervisor, ProgressCallback, SupervisorState};
