//! Argument synthesis for the encoder (ffmpeg) and the muxer (MP4Box).
//!
//! Builders are pure: they read a [`ResolvedEncode`](df_core::ResolvedEncode)
//! and the probed metadata and return the argument list together with a
//! handle for every file the tool is expected to write. Nothing here touches
//! the file system.

pub mod encoder;
pub mod muxer;

use std::path::PathBuf;

use serde::Serialize;

use df_core::{MediaStream, Quality, StreamKind};

pub use encoder::{build_encoder_command, EncoderCommand};
pub use muxer::{build_muxer_command, key_interval_ms, MuxerCommand, DEFAULT_KEY_INTERVAL_MS};

/// One output file the encoder is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamPiece {
    /// Position in the shared video, audio, subtitle sequence.
    pub index: u32,
    pub kind: StreamKind,
    pub path: PathBuf,
    /// ISO 639-2 language, `und` when unknown.
    pub language: String,
    /// The rendition this piece encodes (video only).
    pub quality: Option<Quality>,
    /// The input stream this piece was mapped from.
    pub stream: Option<MediaStream>,
}

impl StreamPiece {
    /// File name component of [`StreamPiece::path`].
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Render a decimal without trailing zeros (`25`, `23.976`).
pub(crate) fn decimal(value: f64) -> String {
    let s = format!("{value:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
