//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`MediaMetadata`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use df_core::media::parse_frame_rate;
use df_core::{MediaMetadata, MediaStream, Result};

use super::Prober;
use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFPROBE};

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.path(FFPROBE)?.to_path_buf()))
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which(FFPROBE).ok().map(Self::new)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        FFPROBE
    }

    async fn probe(&self, path: &Path) -> Result<Option<MediaMetadata>> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await?;
        Ok(parse_ffprobe_json(path, &output.stdout))
    }
}

/// Parse ffprobe's JSON output. Unparsable output yields `None`.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Option<MediaMetadata> {
    match serde_json::from_str::<FfprobeOutput>(json) {
        Ok(output) => Some(build_metadata(path, output)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse ffprobe output");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: OrderedTags,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    profile: Option<String>,
    level: Option<i64>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: OrderedTags,
}

/// Tag object in document order. ffprobe may emit keys that differ only in
/// case; keeping the order lets the first one win.
#[derive(Debug, Default)]
struct OrderedTags(Vec<(String, String)>);

impl OrderedTags {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderedTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TagsVisitor;

        impl<'de> Visitor<'de> for TagsVisitor {
            type Value = OrderedTags;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tag object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut tags = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    tags.push((key, value));
                }
                Ok(OrderedTags(tags))
            }
        }

        deserializer.deserialize_map(TagsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

fn build_metadata(path: &Path, output: FfprobeOutput) -> MediaMetadata {
    let mut meta = MediaMetadata::new(path);

    for (key, value) in &output.format.tags.0 {
        meta.insert_tag(key, value.clone());
    }

    meta.duration_secs = output
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut video_bitrate = None;
    let mut video_frame_rate = None;

    for stream in output.streams {
        let codec_type = stream.codec_type.as_deref().unwrap_or("");
        let frame_rate = stream
            .r_frame_rate
            .as_deref()
            .and_then(positive_rate)
            .or_else(|| stream.avg_frame_rate.as_deref().and_then(positive_rate));
        let bitrate_kbps = stream.bit_rate.as_deref().and_then(kbps);

        let descriptor = MediaStream {
            index: stream.index,
            codec_name: stream.codec_name.unwrap_or_default(),
            pixel_format: stream.pix_fmt,
            profile: stream.profile,
            level: stream.level.filter(|l| *l > 0).map(|l| l.to_string()),
            language: stream.tags.get("language").map(str::to_string),
            frame_rate,
            bitrate_kbps,
            width: stream.width,
            height: stream.height,
        };

        match codec_type {
            "video" => {
                if meta.video_streams.is_empty() {
                    video_bitrate = bitrate_kbps;
                    video_frame_rate = frame_rate;
                }
                meta.video_streams.push(descriptor);
            }
            "audio" => meta.audio_streams.push(descriptor),
            "subtitle" => meta.subtitle_streams.push(descriptor),
            _ => {}
        }
    }

    meta.bitrate_kbps = output
        .format
        .bit_rate
        .as_deref()
        .and_then(kbps)
        .or(video_bitrate)
        .unwrap_or(0);
    meta.framerate = video_frame_rate.unwrap_or(0.0);

    meta
}

fn positive_rate(s: &str) -> Option<f64> {
    parse_frame_rate(s).filter(|r| *r > 0.0)
}

fn kbps(bits: &str) -> Option<u64> {
    bits.trim().parse::<u64>().ok().map(|b| b / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "profile": "High",
                "pix_fmt": "yuv420p",
                "level": 41,
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "24000/1001",
                "avg_frame_rate": "24000/1001",
                "bit_rate": "4800000"
            },
            {
                "index": 1,
                "codec_name": "ac3",
                "codec_type": "audio",
                "bit_rate": "640000",
                "tags": { "language": "eng" }
            },
            {
                "index": 2,
                "codec_name": "subrip",
                "codec_type": "subtitle",
                "tags": { "LANGUAGE": "fre" }
            },
            {
                "index": 3,
                "codec_name": "bin_data",
                "codec_type": "data"
            }
        ],
        "format": {
            "filename": "/media/movie.mkv",
            "duration": "5400.250000",
            "bit_rate": "5000000",
            "tags": { "TITLE": "Movie", "title": "ignored", "ENCODER": "libebml" }
        }
    }"#;

    #[test]
    fn parses_full_output() {
        let meta = parse_ffprobe_json(Path::new("/media/movie.mkv"), SAMPLE).unwrap();

        assert_eq!(meta.bitrate_kbps, 5000);
        assert!((meta.framerate - 23.976).abs() < 0.001);
        assert!((meta.duration_secs - 5400.25).abs() < f64::EPSILON);

        assert_eq!(meta.video_streams.len(), 1);
        let video = &meta.video_streams[0];
        assert_eq!(video.codec_name, "h264");
        assert_eq!(video.pixel_format.as_deref(), Some("yuv420p"));
        assert_eq!(video.profile.as_deref(), Some("High"));
        assert_eq!(video.level.as_deref(), Some("41"));
        assert_eq!(video.bitrate_kbps, Some(4800));

        assert_eq!(meta.audio_streams[0].language.as_deref(), Some("eng"));
        assert_eq!(meta.subtitle_streams[0].language.as_deref(), Some("fre"));
    }

    #[test]
    fn tags_are_lowercased_first_wins() {
        let meta = parse_ffprobe_json(Path::new("/media/movie.mkv"), SAMPLE).unwrap();
        assert_eq!(meta.tags.get("title").map(String::as_str), Some("Movie"));
        assert_eq!(meta.tags.get("encoder").map(String::as_str), Some("libebml"));
    }

    #[test]
    fn bitrate_falls_back_to_video_stream() {
        let json = r#"{
            "streams": [{"codec_type": "video", "bit_rate": "3000000", "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}],
            "format": {}
        }"#;
        let meta = parse_ffprobe_json(Path::new("in.mp4"), json).unwrap();
        assert_eq!(meta.bitrate_kbps, 3000);
        assert_eq!(meta.framerate, 25.0);
    }

    #[test]
    fn unknown_level_is_dropped() {
        let json = r#"{"streams": [{"codec_type": "video", "level": -99}]}"#;
        let meta = parse_ffprobe_json(Path::new("in.mp4"), json).unwrap();
        assert!(meta.video_streams[0].level.is_none());
        assert_eq!(meta.bitrate_kbps, 0);
        assert_eq!(meta.framerate, 0.0);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_ffprobe_json(Path::new("in.mp4"), "not json").is_none());
        assert!(parse_ffprobe_json(Path::new("in.mp4"), "").is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let prober = FfprobeProber::new(PathBuf::from("/nonexistent/ffprobe"));
        assert!(prober.probe(Path::new("in.mp4")).await.is_err());
    }
}
