//! Stream-copy eligibility.
//!
//! Whether the source video can be copied into the top rendition instead of
//! being re-encoded is decided by a [`CopyEligibility`] predicate. It is only
//! consulted when copying is enabled and the crushed ladder starts with the
//! copy sentinel.

use df_core::{MediaMetadata, Quality};

/// Decides whether the source video is compatible with the copy sentinel.
///
/// `hints` is the copy sentinel; its pixel format, profile and level are the
/// ones requested for the top rendition.
pub trait CopyEligibility: Send + Sync {
    fn is_copy_compatible(&self, hints: &Quality, metadata: &MediaMetadata) -> bool;
}

impl<F> CopyEligibility for F
where
    F: Fn(&Quality, &MediaMetadata) -> bool + Send + Sync,
{
    fn is_copy_compatible(&self, hints: &Quality, metadata: &MediaMetadata) -> bool {
        self(hints, metadata)
    }
}

/// Never copies; every rendition is transcoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCopy;

impl CopyEligibility for NeverCopy {
    fn is_copy_compatible(&self, _hints: &Quality, _metadata: &MediaMetadata) -> bool {
        false
    }
}

/// Copies when every hint carried by the sentinel equals the corresponding
/// property of the primary video stream (case-insensitive). A hint that is
/// absent places no constraint. An input without video is never copied.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchingHints;

impl CopyEligibility for MatchingHints {
    fn is_copy_compatible(&self, hints: &Quality, metadata: &MediaMetadata) -> bool {
        let Some(video) = metadata.primary_video() else {
            return false;
        };

        let matches = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(w) => actual.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(w)),
        };

        let compatible = matches(&hints.pixel_format, &video.pixel_format)
            && matches(&hints.profile, &video.profile)
            && matches(&hints.level, &video.level);

        tracing::debug!(
            compatible,
            pixel_format = ?video.pixel_format,
            profile = ?video.profile,
            level = ?video.level,
            "copy eligibility checked"
        );
        compatible
    }
}
