//! Normalized view of a probed input file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// One elementary stream of the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Codec name as reported by the prober (e.g. `h264`, `aac`).
    pub codec_name: String,
    /// Pixel format (video only).
    pub pixel_format: Option<String>,
    /// Codec profile.
    pub profile: Option<String>,
    /// Codec level.
    pub level: Option<String>,
    /// Language tag (ISO 639-2), if present.
    pub language: Option<String>,
    /// Frame rate in frames per second (video only).
    pub frame_rate: Option<f64>,
    /// Stream bit rate in kb/s, if known.
    pub bitrate_kbps: Option<u64>,
    /// Width in pixels (video only).
    pub width: Option<u32>,
    /// Height in pixels (video only).
    pub height: Option<u32>,
}

impl MediaStream {
    /// The stream's language, or `und` when untagged.
    pub fn language_or_und(&self) -> &str {
        self.language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(crate::language::UNDETERMINED)
    }
}

/// Probed metadata for one input file.
///
/// Created once per encode and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Path of the probed file.
    pub input_path: PathBuf,
    /// Video streams in container order.
    pub video_streams: Vec<MediaStream>,
    /// Audio streams in container order.
    pub audio_streams: Vec<MediaStream>,
    /// Subtitle streams in container order.
    pub subtitle_streams: Vec<MediaStream>,
    /// Container tags. Keys are lower-cased.
    pub tags: BTreeMap<String, String>,
    /// Container (or primary video) bit rate in kb/s.
    pub bitrate_kbps: u64,
    /// Frame rate of the primary video stream.
    pub framerate: f64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MediaMetadata {
    /// Create empty metadata for `input_path`.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            ..Self::default()
        }
    }

    /// Insert a tag, lower-casing the key. The first value for a key wins.
    pub fn insert_tag(&mut self, key: &str, value: impl Into<String>) {
        self.tags
            .entry(key.to_lowercase())
            .or_insert_with(|| value.into());
    }

    /// The primary (first) video stream.
    pub fn primary_video(&self) -> Option<&MediaStream> {
        self.video_streams.first()
    }

    /// Streams of the given kind.
    pub fn streams(&self, kind: StreamKind) -> &[MediaStream] {
        match kind {
            StreamKind::Video => &self.video_streams,
            StreamKind::Audio => &self.audio_streams,
            StreamKind::Subtitle => &self.subtitle_streams,
        }
    }
}

/// Parse a frame rate given either as a rational (`24000/1001`) or a decimal
/// (`25`, `29.97`). A zero denominator yields `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let rate = rate.trim();
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    rate.parse().ok()
}
