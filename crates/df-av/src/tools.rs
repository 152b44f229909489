//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the three
//! binaries an encode needs (ffmpeg, ffprobe and MP4Box) and provides lookup
//! methods for the rest of the workspace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use df_core::config::ToolsConfig;

/// Encoder binary name.
pub const FFMPEG: &str = "ffmpeg";
/// Prober binary name.
pub const FFPROBE: &str = "ffprobe";
/// Muxer binary name.
pub const MP4BOX: &str = "MP4Box";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE, MP4BOX];

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool name (e.g. "MP4Box").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// First line of the tool's version banner, if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used only when it exists; otherwise [`which::which`]
    /// locates the tool in `PATH`. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                FFPROBE => tools_config.ffprobe_path.as_deref(),
                MP4BOX => tools_config.mp4box_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "configured tool path missing, searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "tool found");
                    registry.insert(name, path);
                }
                None => tracing::debug!(tool = name, "tool not found"),
            }
        }

        registry
    }

    /// Build a registry from explicit paths, skipping discovery.
    pub fn from_paths<I, S, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        let mut registry = Self::default();
        for (name, path) in paths {
            registry.insert(name, path);
        }
        registry
    }

    /// Register (or replace) a tool location.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        self.tools.insert(
            name.clone(),
            ToolConfig {
                name,
                path: path.into(),
            },
        );
    }

    /// Return the [`ToolConfig`] for the given tool, or [`df_core::Error::Tool`]
    /// if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> df_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            df_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Path of a required tool.
    pub fn path(&self, name: &str) -> df_core::Result<&Path> {
        self.require(name).map(|t| t.path.as_path())
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

/// Run `<tool> -version` and return the first non-empty line.
///
/// MP4Box prints its banner on stderr, so both streams are checked.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    let first_line = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    };

    first_line(&output.stdout).or_else(|| first_line(&output.stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // No tool is guaranteed to be installed; the call must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require(MP4BOX).unwrap_err();
        assert!(err.to_string().contains("MP4Box"));
    }

    #[test]
    fn check_all_reports_every_known_tool() {
        let infos = ToolRegistry::default().check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe", "MP4Box"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("MP4Box");
        std::fs::write(&fake, "").unwrap();

        let cfg = ToolsConfig {
            mp4box_path: Some(fake.clone()),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.path(MP4BOX).unwrap(), fake.as_path());
    }

    #[test]
    fn from_paths_registers_tools() {
        let registry = ToolRegistry::from_paths([(FFMPEG, "/opt/ffmpeg"), (MP4BOX, "/opt/MP4Box")]);
        assert_eq!(registry.path(FFMPEG).unwrap(), Path::new("/opt/ffmpeg"));
        assert!(registry.require(FFPROBE).is_err());
        assert_eq!(registry.iter().count(), 2);
    }
}
