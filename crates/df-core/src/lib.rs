//! df-core: shared types, errors, configuration, and the quality ladder.
//!
//! This crate is the foundational dependency for all other df-* crates,
//! providing the unified error type, the encode request and its resolved
//! form, the [`Quality`] rendition model with the quality crusher, the
//! normalized [`MediaMetadata`] view of a probed input, and the language
//! table used to label subtitle tracks.

pub mod config;
pub mod crusher;
pub mod error;
pub mod language;
pub mod media;
pub mod quality;

// Re-export the most commonly used items at the crate root.
pub use config::{DashRequest, EncoderOptions, MuxerOptions, ResolvedEncode};
pub use crusher::{crush_qualities, DEFAULT_CRUSH_TOLERANCE};
pub use error::{Error, Result};
pub use language::Language;
pub use media::{MediaMetadata, MediaStream, StreamKind};
pub use quality::{Quality, QualityTier};
