//! Encode request and application configuration types.
//!
//! A [`DashRequest`] is what a caller asks for; it is never mutated. The
//! orchestrator derives a [`ResolvedEncode`] from it once the input has been
//! probed. The application-level [`Config`] is deserialized from TOML and
//! every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::crusher::{crush_qualities, DEFAULT_CRUSH_TOLERANCE};
use crate::error::Result;
use crate::media::MediaMetadata;
use crate::quality::{Quality, QualityTier, DEFAULT_PRESET};
use crate::Error;

/// Keyframe interval used when the frame rate is unknown.
const FALLBACK_GOP_SECONDS: f64 = 3.0;

// ---------------------------------------------------------------------------
// Encode request
// ---------------------------------------------------------------------------

/// Encoder knobs that are not derived from the probed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
    pub audio_channels: u32,
    /// Appended verbatim after each video output's own arguments.
    pub additional_video_flags: Vec<String>,
    /// Appended verbatim after each audio output's own arguments.
    pub additional_audio_flags: Vec<String>,
    /// Appended verbatim after each subtitle output's own arguments.
    pub additional_subtitle_flags: Vec<String>,
    /// Inserted before `-i`.
    pub additional_global_flags: Vec<String>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            audio_bitrate_kbps: 128,
            audio_channels: 2,
            additional_video_flags: Vec::new(),
            additional_audio_flags: Vec::new(),
            additional_subtitle_flags: Vec::new(),
            additional_global_flags: Vec::new(),
        }
    }
}

/// Muxer knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerOptions {
    /// DASH profile passed to `-profile`.
    pub profile: String,
    /// Appended verbatim before `-out`.
    pub additional_flags: Vec<String>,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            profile: "onDemand".into(),
            additional_flags: Vec::new(),
        }
    }
}

/// One encode, as requested by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashRequest {
    pub input: PathBuf,
    pub output_directory: PathBuf,
    pub output_basename: String,
    /// Where intermediate pieces are written. Defaults to `output_directory`.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Requested ladder, highest rendition first.
    pub qualities: Vec<Quality>,
    /// Output frame rate. Back-filled from the input when unset.
    #[serde(default)]
    pub framerate: Option<f64>,
    /// GOP size in frames. Defaults to three seconds of frames.
    #[serde(default)]
    pub keyframe_interval: Option<u32>,
    #[serde(default)]
    pub enable_stream_copying: bool,
    #[serde(default)]
    pub disable_quality_crushing: bool,
    #[serde(default = "default_crush_tolerance")]
    pub crush_tolerance: f64,
    #[serde(default)]
    pub encoder: EncoderOptions,
    #[serde(default)]
    pub muxer: MuxerOptions,
}

fn default_crush_tolerance() -> f64 {
    DEFAULT_CRUSH_TOLERANCE
}

impl DashRequest {
    /// Create a request with default options.
    pub fn new(
        input: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
        output_basename: impl Into<String>,
        qualities: Vec<Quality>,
    ) -> Self {
        Self {
            input: input.into(),
            output_directory: output_directory.into(),
            output_basename: output_basename.into(),
            working_directory: None,
            qualities,
            framerate: None,
            keyframe_interval: None,
            enable_stream_copying: false,
            disable_quality_crushing: false,
            crush_tolerance: DEFAULT_CRUSH_TOLERANCE,
            encoder: EncoderOptions::default(),
            muxer: MuxerOptions::default(),
        }
    }

    /// Builder: set a separate directory for intermediate pieces.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Builder: fix the output frame rate.
    pub fn with_framerate(mut self, framerate: f64) -> Self {
        self.framerate = Some(framerate);
        self
    }

    /// Builder: fix the GOP size.
    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = Some(frames);
        self
    }

    /// Builder: allow passing the top rendition through untouched.
    pub fn with_stream_copying(mut self, enabled: bool) -> Self {
        self.enable_stream_copying = enabled;
        self
    }

    /// Builder: skip quality crushing entirely.
    pub fn without_quality_crushing(mut self) -> Self {
        self.disable_quality_crushing = true;
        self
    }

    /// Builder: replace the encoder options.
    pub fn with_encoder(mut self, encoder: EncoderOptions) -> Self {
        self.encoder = encoder;
        self
    }

    /// Builder: replace the muxer options.
    pub fn with_muxer(mut self, muxer: MuxerOptions) -> Self {
        self.muxer = muxer;
        self
    }

    /// Directory for intermediate pieces.
    pub fn working_directory(&self) -> &Path {
        self.working_directory
            .as_deref()
            .unwrap_or(&self.output_directory)
    }

    /// Final manifest location: `{output_directory}/{output_basename}.mpd`.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}.mpd", self.output_basename))
    }

    /// Check the fields that do not require touching the file system.
    pub fn validate(&self) -> Result<()> {
        if self.output_basename.trim().is_empty() {
            return Err(Error::InvalidArgument("output basename is empty".into()));
        }
        if self.output_basename.contains(['/', '\\']) {
            return Err(Error::InvalidArgument(format!(
                "output basename '{}' must not contain path separators",
                self.output_basename
            )));
        }
        if self.qualities.is_empty() {
            return Err(Error::InvalidArgument("no qualities requested".into()));
        }
        if let Some(fps) = self.framerate {
            if !fps.is_finite() || fps < 0.0 {
                return Err(Error::InvalidArgument(format!("invalid framerate {fps}")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolved encode
// ---------------------------------------------------------------------------

/// A [`DashRequest`] with everything the probe could fill in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEncode {
    pub request: DashRequest,
    /// Crushed (or requested) ladder, highest rendition first.
    pub qualities: Vec<Quality>,
    pub framerate: f64,
    pub keyframe_interval: u32,
    /// Pass the top rendition through with `-c:v copy`.
    pub copy_top_quality: bool,
}

impl ResolvedEncode {
    /// Derive the resolved encode.
    ///
    /// `copy_allowed` receives the copy sentinel (carrying the codec hints of
    /// the first requested rendition) and is only consulted when stream
    /// copying is enabled and the top rendition is that sentinel.
    pub fn resolve(
        request: &DashRequest,
        metadata: &MediaMetadata,
        copy_allowed: impl FnOnce(&Quality, &MediaMetadata) -> bool,
    ) -> Self {
        let qualities = if request.disable_quality_crushing {
            request.qualities.clone()
        } else {
            crush_qualities(
                &request.qualities,
                metadata.bitrate_kbps,
                request.crush_tolerance,
            )
        };

        let copy_candidate = qualities
            .first()
            .filter(|q| request.enable_stream_copying && q.is_copy());
        let copy_top_quality = match copy_candidate {
            Some(top) => {
                let allowed = copy_allowed(top, metadata);
                if !allowed {
                    tracing::info!(
                        input = %request.input.display(),
                        "source video is not copy compatible, transcoding top rendition"
                    );
                }
                allowed
            }
            None => false,
        };

        let framerate = request.framerate.unwrap_or(metadata.framerate);
        let keyframe_interval = request
            .keyframe_interval
            .unwrap_or_else(|| default_keyframe_interval(framerate));

        Self {
            request: request.clone(),
            qualities,
            framerate,
            keyframe_interval,
            copy_top_quality,
        }
    }

    /// Directory for intermediate pieces.
    pub fn working_directory(&self) -> &Path {
        self.request.working_directory()
    }

    /// Final manifest location.
    pub fn manifest_path(&self) -> PathBuf {
        self.request.manifest_path()
    }
}

/// Three seconds worth of frames.
pub fn default_keyframe_interval(framerate: f64) -> u32 {
    if !framerate.is_finite() || framerate <= 0.0 {
        return 0;
    }
    (framerate.round() * FALLBACK_GOP_SECONDS) as u32
}

// ---------------------------------------------------------------------------
// Application config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub encode: EncodeDefaults,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("ffmpeg_path", &self.tools.ffmpeg_path),
            ("ffprobe_path", &self.tools.ffprobe_path),
            ("mp4box_path", &self.tools.mp4box_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} '{}' does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        let enc = &self.encode;
        if enc.crush_tolerance <= 0.0 {
            warnings.push(format!(
                "encode.crush_tolerance is {}; quality crushing will have no effect",
                enc.crush_tolerance
            ));
        } else if enc.crush_tolerance > 1.0 {
            warnings.push(format!(
                "encode.crush_tolerance {} is above 1.0; renditions above the source bitrate will be kept",
                enc.crush_tolerance
            ));
        }

        if enc.encoder.video_codec.trim().is_empty() {
            warnings.push("encode.encoder.video_codec is empty".into());
        }
        if enc.encoder.audio_codec.trim().is_empty() {
            warnings.push("encode.encoder.audio_codec is empty".into());
        }
        if enc.encoder.audio_channels == 0 {
            warnings.push("encode.encoder.audio_channels is 0".into());
        }
        if enc.encoder.audio_bitrate_kbps == 0 {
            warnings.push("encode.encoder.audio_bitrate_kbps is 0".into());
        }

        let profiles = ["onDemand", "live", "main", "simple", "full", "dashavc264:live", "dashavc264:onDemand"];
        if !profiles.contains(&enc.muxer.profile.as_str()) {
            warnings.push(format!(
                "encode.muxer.profile '{}' is not a recognized DASH profile (valid: {})",
                enc.muxer.profile,
                profiles.join(", ")
            ));
        }

        warnings
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub mp4box_path: Option<PathBuf>,
}

/// Defaults applied to requests built from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeDefaults {
    pub tier: QualityTier,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crush_tolerance")]
    pub crush_tolerance: f64,
    pub enable_stream_copying: bool,
    pub disable_quality_crushing: bool,
    pub encoder: EncoderOptions,
    pub muxer: MuxerOptions,
}

fn default_preset() -> String {
    DEFAULT_PRESET.into()
}

impl Default for EncodeDefaults {
    fn default() -> Self {
        Self {
            tier: QualityTier::High,
            preset: default_preset(),
            crush_tolerance: DEFAULT_CRUSH_TOLERANCE,
            enable_stream_copying: false,
            disable_quality_crushing: false,
            encoder: EncoderOptions::default(),
            muxer: MuxerOptions::default(),
        }
    }
}

impl EncodeDefaults {
    /// Build a request from these defaults. An empty `qualities` uses the
    /// configured tier's ladder.
    pub fn request(
        &self,
        input: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
        output_basename: impl Into<String>,
        qualities: Vec<Quality>,
    ) -> DashRequest {
        let qualities = if qualities.is_empty() {
            self.tier.ladder(&self.preset)
        } else {
            qualities
        };

        DashRequest {
            enable_stream_copying: self.enable_stream_copying,
            disable_quality_crushing: self.disable_quality_crushing,
            crush_tolerance: self.crush_tolerance,
            encoder: self.encoder.clone(),
            muxer: self.muxer.clone(),
            ..DashRequest::new(input, output_directory, output_basename, qualities)
        }
    }
}
