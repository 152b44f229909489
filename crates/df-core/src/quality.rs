//! Output rendition model.
//!
//! A [`Quality`] describes one rung of the quality ladder. A bitrate of `0`
//! is reserved for the copy sentinel: "pass the source video through without
//! re-encoding".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default encoder speed preset.
pub const DEFAULT_PRESET: &str = "medium";

/// One output rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    /// Output width in pixels (`0` keeps the source width).
    #[serde(default)]
    pub width: u32,
    /// Output height in pixels (`0` keeps the source height).
    #[serde(default)]
    pub height: u32,
    /// Target video bitrate in kb/s. `0` marks the copy sentinel.
    pub bitrate_kbps: u64,
    /// Encoder speed preset (e.g. `medium`, `slow`).
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Optional pixel format hint (`-pix_fmt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    /// Optional codec profile hint (`-profile:v`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Optional codec level hint (`-level`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

impl Quality {
    /// Create a rendition with no codec hints.
    pub fn new(width: u32, height: u32, bitrate_kbps: u64, preset: impl Into<String>) -> Self {
        Self {
            width,
            height,
            bitrate_kbps,
            preset: preset.into(),
            pixel_format: None,
            profile: None,
            level: None,
        }
    }

    /// The copy sentinel.
    pub fn copy() -> Self {
        Self::new(0, 0, 0, DEFAULT_PRESET)
    }

    /// Builder: attach codec hints.
    pub fn with_hints(
        mut self,
        pixel_format: Option<String>,
        profile: Option<String>,
        level: Option<String>,
    ) -> Self {
        self.pixel_format = pixel_format;
        self.profile = profile;
        self.level = level;
        self
    }

    /// Whether this entry is the copy sentinel.
    pub fn is_copy(&self) -> bool {
        self.bitrate_kbps == 0
    }

    /// Ladder identity: two renditions are the same rung when their bitrates
    /// match, regardless of resolution or preset.
    pub fn same_bitrate(&self, other: &Quality) -> bool {
        self.bitrate_kbps == other.bitrate_kbps
    }

    /// Whether the rendition requests an explicit output size.
    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_copy() {
            return write!(f, "copy");
        }
        write!(
            f,
            "{}x{}@{}k:{}",
            self.width, self.height, self.bitrate_kbps, self.preset
        )
    }
}

/// Parses `WIDTHxHEIGHT@KBPS[:preset]`, or the literal `copy`.
impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("copy") {
            return Ok(Self::copy());
        }

        let invalid = || {
            Error::InvalidArgument(format!(
                "invalid quality '{s}', expected WIDTHxHEIGHT@KBPS[:preset]"
            ))
        };

        let (size, rest) = s.split_once('@').ok_or_else(invalid)?;
        let (width, height) = size.split_once(['x', 'X']).ok_or_else(invalid)?;
        let (bitrate, preset) = match rest.split_once(':') {
            Some((b, p)) if !p.is_empty() => (b, p),
            Some((b, _)) => (b, DEFAULT_PRESET),
            None => (rest, DEFAULT_PRESET),
        };

        let width: u32 = width.parse().map_err(|_| invalid())?;
        let height: u32 = height.parse().map_err(|_| invalid())?;
        let bitrate_kbps: u64 = bitrate
            .trim_end_matches(['k', 'K'])
            .parse()
            .map_err(|_| invalid())?;

        Ok(Self::new(width, height, bitrate_kbps, preset))
    }
}

/// Predefined ladders, highest rendition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    /// Build the ladder for this tier using `preset` on every rung.
    pub fn ladder(self, preset: &str) -> Vec<Quality> {
        let rungs: &[(u32, u32, u64)] = match self {
            Self::Low => &[(1280, 720, 1600), (854, 480, 800), (640, 360, 400)],
            Self::Medium => &[
                (1920, 1080, 4000),
                (1280, 720, 2400),
                (854, 480, 1200),
                (640, 360, 600),
            ],
            Self::High => &[
                (1920, 1080, 6000),
                (1280, 720, 3600),
                (854, 480, 1800),
                (640, 360, 900),
            ],
            Self::Ultra => &[
                (3840, 2160, 16000),
                (2560, 1440, 9000),
                (1920, 1080, 6000),
                (1280, 720, 3600),
                (854, 480, 1800),
            ],
        };

        rungs
            .iter()
            .map(|&(w, h, b)| Quality::new(w, h, b, preset))
            .collect()
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(Error::InvalidArgument(format!(
                "unknown quality tier '{other}' (valid: low, medium, high, ultra)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_sentinel() {
        let q = Quality::copy();
        assert!(q.is_copy());
        assert!(!q.has_resolution());
        assert_eq!(q.to_string(), "copy");
    }

    #[test]
    fn same_bitrate_ignores_resolution() {
        let a = Quality::new(1920, 1080, 4000, "slow");
        let b = Quality::new(1280, 720, 4000, "fast");
        assert!(a.same_bitrate(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_full_form() {
        let q: Quality = "1920x1080@6000:slow".parse().unwrap();
        assert_eq!(q, Quality::new(1920, 1080, 6000, "slow"));
    }

    #[test]
    fn parse_defaults_preset_and_accepts_k_suffix() {
        let q: Quality = "1280X720@2400k".parse().unwrap();
        assert_eq!(q.bitrate_kbps, 2400);
        assert_eq!(q.preset, DEFAULT_PRESET);
    }

    #[test]
    fn parse_copy_literal() {
        let q: Quality = "COPY".parse().unwrap();
        assert!(q.is_copy());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("1920x1080".parse::<Quality>().is_err());
        assert!("widexhigh@1".parse::<Quality>().is_err());
        assert!("1920x1080@fast".parse::<Quality>().is_err());
    }

    #[test]
    fn tiers_are_descending() {
        for tier in [
            QualityTier::Low,
            QualityTier::Medium,
            QualityTier::High,
            QualityTier::Ultra,
        ] {
            let ladder = tier.ladder("fast");
            assert!(ladder.windows(2).all(|w| w[0].bitrate_kbps > w[1].bitrate_kbps));
            assert!(ladder.iter().all(|q| q.preset == "fast"));
        }
    }

    #[test]
    fn quality_deserializes_with_defaults() {
        let q: Quality = serde_json::from_str(r#"{"bitrate_kbps": 800}"#).unwrap();
        assert_eq!(q.width, 0);
        assert_eq!(q.preset, DEFAULT_PRESET);
        assert!(q.level.is_none());
    }
}
