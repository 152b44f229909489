//! Subtitle harvesting.
//!
//! After muxing, WebVTT tracks extracted by the encoder are moved into the
//! output directory and sidecar `.vtt` files next to the input are copied in.
//! Every harvested file gets an index continuing the encoder's piece
//! sequence so names never collide with encoder output.

use std::path::{Path, PathBuf};

use serde::Serialize;

use df_av::builder::encoder::subtitle_file_name;
use df_av::EncoderCommand;
use df_core::{Language, ResolvedEncode, Result};

/// Where a harvested subtitle came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleSource {
    /// Extracted from an input subtitle stream by the encoder.
    Encoded,
    /// A sidecar file found next to the input.
    Sidecar(PathBuf),
}

/// A subtitle file in the output directory, ready to reference from the
/// manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestedSubtitle {
    pub index: u32,
    /// ISO 639-2 code, `und` when unknown.
    pub language: String,
    pub label: String,
    pub path: PathBuf,
    pub source: SubtitleSource,
}

impl HarvestedSubtitle {
    /// File name relative to the output directory.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Move encoder subtitle pieces and copy sidecar files into the output
/// directory.
///
/// Encoder pieces that were not written are skipped with a warning. Indexes
/// start at one past the encoder's highest piece index. Languages from both
/// sources go through the language table, so `fre` and `fra` name the same
/// track.
pub async fn harvest_subtitles(
    resolved: &ResolvedEncode,
    encoder: &EncoderCommand,
) -> Result<Vec<HarvestedSubtitle>> {
    let request = &resolved.request;
    let out_dir = &request.output_directory;
    let base = &request.output_basename;
    let mut next_index = encoder.max_index().map_or(0, |max| max + 1);
    let mut harvested = Vec::new();

    for piece in &encoder.subtitle_pieces {
        if !piece.path.exists() {
            tracing::warn!(path = %piece.path.display(), "encoder did not write subtitle piece");
            continue;
        }
        let language = Language::resolve(&piece.language);
        let target = out_dir.join(subtitle_file_name(base, language.code, next_index));
        move_file(&piece.path, &target).await?;
        tracing::debug!(from = %piece.path.display(), to = %target.display(), "subtitle moved");

        harvested.push(HarvestedSubtitle {
            index: next_index,
            language: language.code.to_string(),
            label: language.label.to_string(),
            path: target,
            source: SubtitleSource::Encoded,
        });
        next_index += 1;
    }

    for sidecar in find_sidecars(&request.input).await? {
        let file_name = sidecar
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let language = Language::from_file_name(&file_name);
        let target = out_dir.join(subtitle_file_name(base, language.code, next_index));
        tokio::fs::copy(&sidecar, &target).await?;
        tracing::debug!(from = %sidecar.display(), to = %target.display(), "sidecar subtitle copied");

        harvested.push(HarvestedSubtitle {
            index: next_index,
            language: language.code.to_string(),
            label: language.label.to_string(),
            path: target,
            source: SubtitleSource::Sidecar(sidecar),
        });
        next_index += 1;
    }

    Ok(harvested)
}

/// `.vtt` files in the input's directory named `{stem}.vtt` or
/// `{stem}.<anything>.vtt`, sorted by name.
pub async fn find_sidecars(input: &Path) -> Result<Vec<PathBuf>> {
    let Some(stem) = input.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };
    let dir = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = format!("{stem}.");

    let mut entries = tokio::fs::read_dir(&dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_vtt = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("vtt"));
        if !is_vtt || !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Rename, falling back to copy and remove across file systems. An existing
/// target is replaced.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
