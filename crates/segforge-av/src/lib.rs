//! # segforge-av
//!
//! Media engine access for the segforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Engine seam** ([`MediaEngine`]) -- the two operations the pipeline
//!   needs: probe an input and cut one window out of it.
//! - **ffmpeg backend** ([`FfmpegEngine`]) -- implements [`MediaEngine`] by
//!   shelling out to the CLI tools.

pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{AudioFormat, MediaEngine, SegmentRequest};
pub use ffmpeg::{segment_args, FfmpegEngine};
pub use probe::{parse_ffprobe_json, probe_with_ffprobe};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
