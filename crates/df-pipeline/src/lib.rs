//! # df-pipeline
//!
//! Orchestration of a single-input MPEG-DASH encode.
//!
//! This crate provides:
//!
//! - **[`DashEncoder`]** -- probes the input, resolves the quality ladder,
//!   runs the encoder and the muxer, harvests subtitles and post-processes
//!   the manifest, cleaning up partial output on failure.
//! - **[`EncodeContext`]** -- cancellation, progress and tool-output sinks
//!   shared by every stage.
//! - **[`ProgressShim`]** -- turns encoder status lines into progress
//!   fractions.
//! - **[`CopyEligibility`]** -- the pluggable predicate deciding whether the
//!   top rendition may be stream-copied.
//! - **[`harvest_subtitles`]** -- moves extracted and sidecar WebVTT files
//!   into the output directory.

pub mod context;
pub mod copy;
pub mod orchestrator;
pub mod progress;
pub mod subtitles;

// Re-export key types at the crate root.
pub use context::{EncodeContext, LogSink, MemoryLogSink, ProgressSender, TracingLogSink};
pub use copy::{CopyEligibility, MatchingHints, NeverCopy};
pub use orchestrator::{DashEncodeResult, DashEncoder, EncodeStage};
pub use progress::ProgressShim;
pub use subtitles::{find_sidecars, harvest_subtitles, HarvestedSubtitle, SubtitleSource};
