//! # df-mpd
//!
//! The DASH manifest (MPD) as written by MP4Box, and the post-processing
//! step that adds WebVTT subtitle tracks to it.
//!
//! - [`xml`] is a lossless element tree read and written with quick-xml's
//!   event API. Nothing MP4Box writes is dropped on a rewrite.
//! - [`Mpd`] wraps that tree with queries over periods, adaptation sets and
//!   representations.
//! - [`with_subtitles`] is a pure transform from one manifest to another.

pub mod model;
pub mod postprocess;
pub mod xml;

pub use model::Mpd;
pub use postprocess::{with_subtitles, SubtitleEntry, GPAC_ROLE_SCHEME, SUBTITLE_BANDWIDTH};
pub use xml::{Document, Element, Node};
