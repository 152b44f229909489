//! Media probing.
//!
//! The encode pipeline consumes probe results through the [`Prober`] trait so
//! tests (and alternative backends) can supply metadata without running
//! ffprobe.

pub mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use df_core::{MediaMetadata, Result};

pub use self::ffprobe::FfprobeProber;

/// Source of [`MediaMetadata`] for an input file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Probe `path`.
    ///
    /// Returns `Ok(None)` when the backend ran but its output could not be
    /// understood; `Err` is reserved for failing to run the backend at all.
    async fn probe(&self, path: &Path) -> Result<Option<MediaMetadata>>;
}
