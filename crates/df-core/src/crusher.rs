//! Quality ladder crushing.
//!
//! Encoding a rendition at a bitrate above the source's own bitrate wastes
//! time and bytes. [`crush_qualities`] drops those rungs and, when it drops
//! anything, makes sure a copy rendition stands in for the top of the ladder.

use crate::quality::Quality;

/// Default multiplier applied to the source bitrate.
pub const DEFAULT_CRUSH_TOLERANCE: f64 = 0.90;

/// Reduce `ladder` to the rungs strictly below
/// `source_bitrate_kbps * tolerance`.
///
/// - A non-positive tolerance or an empty ladder returns the ladder as-is.
/// - Retained rungs are de-duplicated by bitrate, first occurrence wins.
/// - If nothing was removed the original ladder is returned unchanged.
/// - If rungs were removed and no copy sentinel survived, a copy sentinel
///   carrying the first original rung's pixel format, profile and level is
///   prepended.
pub fn crush_qualities(ladder: &[Quality], source_bitrate_kbps: u64, tolerance: f64) -> Vec<Quality> {
    if tolerance <= 0.0 || ladder.is_empty() {
        return ladder.to_vec();
    }

    let threshold = source_bitrate_kbps as f64 * tolerance;

    let mut retained: Vec<Quality> = Vec::with_capacity(ladder.len());
    for quality in ladder {
        if (quality.bitrate_kbps as f64) >= threshold {
            continue;
        }
        if retained.iter().any(|kept| kept.same_bitrate(quality)) {
            continue;
        }
        retained.push(quality.clone());
    }

    if retained.len() == ladder.len() {
        return ladder.to_vec();
    }

    if retained.iter().any(Quality::is_copy) {
        tracing::debug!(
            removed = ladder.len() - retained.len(),
            "crushed ladder already contains a copy rendition"
        );
        return retained;
    }

    let first = &ladder[0];
    let copy = Quality::copy().with_hints(
        first.pixel_format.clone(),
        first.profile.clone(),
        first.level.clone(),
    );

    tracing::debug!(
        removed = ladder.len() - retained.len(),
        threshold_kbps = threshold,
        "crushed ladder, prepending copy rendition"
    );

    let mut crushed = Vec::with_capacity(retained.len() + 1);
    crushed.push(copy);
    crushed.extend(retained);
    crushed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder(bitrates: &[u64]) -> Vec<Quality> {
        bitrates
            .iter()
            .map(|&b| Quality::new(1280, 720, b, "fast"))
            .collect()
    }

    fn bitrates(ladder: &[Quality]) -> Vec<u64> {
        ladder.iter().map(|q| q.bitrate_kbps).collect()
    }

    #[test]
    fn non_positive_tolerance_is_identity() {
        let input = ladder(&[9000, 6000, 3000]);
        assert_eq!(crush_qualities(&input, 1000, 0.0), input);
        assert_eq!(crush_qualities(&input, 1000, -1.5), input);
    }

    #[test]
    fn empty_ladder_is_identity() {
        assert!(crush_qualities(&[], 5000, 0.9).is_empty());
    }

    #[test]
    fn ladder_below_threshold_is_unchanged() {
        let input = ladder(&[4000, 2000, 1000]);
        assert_eq!(crush_qualities(&input, 5000, 0.9), input);
    }

    #[test]
    fn removed_rungs_are_replaced_by_copy() {
        let input = vec![
            Quality::new(1920, 1080, 6000, "slow").with_hints(
                Some("yuv420p".into()),
                Some("high".into()),
                Some("4.1".into()),
            ),
            Quality::new(1280, 720, 4000, "slow"),
            Quality::new(854, 480, 2000, "slow"),
        ];

        let crushed = crush_qualities(&input, 5000, DEFAULT_CRUSH_TOLERANCE);

        assert_eq!(bitrates(&crushed), vec![0, 4000, 2000]);
        let copy = &crushed[0];
        assert!(copy.is_copy());
        assert_eq!(copy.pixel_format.as_deref(), Some("yuv420p"));
        assert_eq!(copy.profile.as_deref(), Some("high"));
        assert_eq!(copy.level.as_deref(), Some("4.1"));
    }

    #[test]
    fn threshold_is_exclusive() {
        // 4500 == 5000 * 0.9 and must be removed.
        let crushed = crush_qualities(&ladder(&[4500, 4499]), 5000, 0.9);
        assert_eq!(bitrates(&crushed), vec![0, 4499]);
    }

    #[test]
    fn existing_copy_is_not_duplicated() {
        let mut input = ladder(&[8000, 2000]);
        input.push(Quality::copy());

        let crushed = crush_qualities(&input, 5000, 0.9);
        assert_eq!(bitrates(&crushed), vec![2000, 0]);
    }

    #[test]
    fn duplicate_bitrates_collapse_after_removal() {
        let input = vec![
            Quality::new(1920, 1080, 8000, "slow"),
            Quality::new(1280, 720, 2000, "slow"),
            Quality::new(960, 540, 2000, "fast"),
        ];
        let crushed = crush_qualities(&input, 5000, 0.9);
        assert_eq!(bitrates(&crushed), vec![0, 2000]);
        assert_eq!(crushed[1].width, 1280);
    }

    #[test]
    fn crushing_is_idempotent() {
        let input = ladder(&[6000, 4000, 2000]);
        let once = crush_qualities(&input, 5000, 0.9);
        let twice = crush_qualities(&once, 5000, 0.9);
        assert_eq!(once, twice);
    }

    #[test]
    fn everything_removed_leaves_only_copy() {
        let crushed = crush_qualities(&ladder(&[9000, 7000]), 1000, 0.9);
        assert_eq!(crushed.len(), 1);
        assert!(crushed[0].is_copy());
    }
}
