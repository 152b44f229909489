//! Subtitle injection.

use serde::Serialize;

use crate::model::{Mpd, ADAPTATION_SET, PERIOD, PROGRAM_INFORMATION, REPRESENTATION};
use crate::xml::{Element, Node};

/// Role scheme MP4Box uses for its own track roles.
pub const GPAC_ROLE_SCHEME: &str = "urn:gpac:dash:role:2013";

/// Nominal bandwidth declared for a subtitle representation.
pub const SUBTITLE_BANDWIDTH: u64 = 256;

/// A WebVTT file to reference from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleEntry {
    /// ISO 639-2 language code.
    pub language: String,
    /// File name relative to the manifest's directory.
    pub file_name: String,
}

impl SubtitleEntry {
    pub fn new(language: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            file_name: file_name.into(),
        }
    }
}

/// Produce a copy of `mpd` with one subtitle adaptation set per entry
/// appended to every period.
///
/// The program information block is removed; everything else in the
/// document is carried over as is. New representation IDs start at one past
/// the largest existing numeric ID (or at 1) and keep counting across
/// periods, so IDs stay unique over the whole manifest.
pub fn with_subtitles(mpd: &Mpd, subtitles: &[SubtitleEntry]) -> Mpd {
    let mut out = mpd.clone();
    let root = out.root_mut();
    root.remove_children(PROGRAM_INFORMATION);

    let mut next_id = mpd.max_representation_id().map_or(1, |max| max + 1);
    let mut periods = 0;

    for node in &mut root.children {
        let Node::Element(period) = node else {
            continue;
        };
        if period.local_name() != PERIOD {
            continue;
        }
        periods += 1;
        for subtitle in subtitles {
            period.append_element(subtitle_adaptation_set(subtitle, next_id));
            next_id += 1;
        }
    }

    tracing::debug!(
        subtitles = subtitles.len(),
        periods,
        "subtitle adaptation sets added"
    );
    out
}

fn subtitle_adaptation_set(subtitle: &SubtitleEntry, id: u64) -> Element {
    Element::new(ADAPTATION_SET)
        .with_attr("mimeType", "text/vtt")
        .with_attr("contentType", "text")
        .with_attr("lang", subtitle.language.as_str())
        .with_child(
            Element::new("Role")
                .with_attr("schemeIdUri", GPAC_ROLE_SCHEME)
                .with_attr("value", format!("{} {id}", subtitle.language)),
        )
        .with_child(
            Element::new(REPRESENTATION)
                .with_attr("id", id.to_string())
                .with_attr("bandwidth", SUBTITLE_BANDWIDTH.to_string())
                .with_child(Element::new("BaseURL").with_text(subtitle.file_name.as_str())),
        )
}
