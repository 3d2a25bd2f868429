//! rendition-av: external tool plumbing.
//!
//! The encoder and the metrics probe are opaque executables. This crate
//! builds their command lines, runs them as async subprocesses with
//! captured output, and interprets the results:
//!
//! - [`ToolCommand`]: subprocess builder with optional timeout
//! - [`tools`]: discovery of `ffmpeg` / `ffprobe`
//! - [`ffmpeg`]: rendition argument builders and the [`Encoder`]
//! - [`probe`]: ffprobe-based [`MediaMetrics`] extraction

pub mod command;
pub mod ffmpeg;
pub mod probe;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use ffmpeg::{audio_bitrate_for_height, EncodeSettings, Encoder};
pub use probe::{MediaMetrics, Prober};
pub use tools::{check_tool, check_tools, resolve_tool, ToolInfo};
