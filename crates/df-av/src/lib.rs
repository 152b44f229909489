//! # df-av
//!
//! External tool plumbing for the dashforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and MP4Box.
//! - **Command execution** ([`ToolCommand`]) -- captured execution with a
//!   timeout, and streaming execution with cancellation.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- turn an input file into
//!   [`df_core::MediaMetadata`].
//! - **Command builders** ([`builder`]) -- pure argument synthesis for the
//!   encoder and muxer.

pub mod builder;
pub mod command;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use builder::{
    build_encoder_command, build_muxer_command, key_interval_ms, EncoderCommand, MuxerCommand,
    StreamPiece,
};
pub use command::{ExecutionOutput, OutputLine, ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, Prober};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, FFMPEG, FFPROBE, MP4BOX};
