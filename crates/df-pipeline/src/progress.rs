//! Turns encoder stderr into progress reports.

use std::sync::Arc;

use regex::Regex;

use df_core::{Error, Result};

use crate::context::{LogSink, ProgressSender};

/// Elapsed-time token ffmpeg prints on its status line, e.g. `time=00:01:02.50`.
const TIME_PATTERN: &str = r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)";

/// Routes encoder output lines to the log sink and reports progress for
/// lines that carry an elapsed time.
pub struct ProgressShim {
    pattern: Regex,
    duration_secs: f64,
    progress: Arc<ProgressSender>,
    log: Arc<dyn LogSink>,
}

impl ProgressShim {
    /// `duration_secs` is the total input duration; when it is not positive
    /// progress lines are still routed but no fraction is reported.
    pub fn new(duration_secs: f64, progress: Arc<ProgressSender>, log: Arc<dyn LogSink>) -> Result<Self> {
        let pattern = Regex::new(TIME_PATTERN)
            .map_err(|e| Error::Internal(format!("progress pattern: {e}")))?;
        Ok(Self {
            pattern,
            duration_secs,
            progress,
            log,
        })
    }

    /// Handle one stderr line from the encoder.
    ///
    /// Progress lines are reported and forwarded to the stdout sink, all other
    /// lines go to the stderr sink unchanged. `None` is forwarded as an empty
    /// stderr line.
    pub fn stderr_line(&self, line: Option<&str>) {
        let Some(line) = line else {
            self.log.stderr_line("");
            return;
        };

        match self.elapsed_secs(line) {
            Some(elapsed) => {
                if let Some(fraction) = fraction_of(elapsed, self.duration_secs) {
                    self.progress.send(fraction);
                }
                self.log.stdout_line(line);
            }
            None => self.log.stderr_line(line),
        }
    }

    /// Handle one stdout line from the encoder.
    pub fn stdout_line(&self, line: &str) {
        self.log.stdout_line(line);
    }

    /// Elapsed time on an ffmpeg status line, in seconds.
    pub fn elapsed_secs(&self, line: &str) -> Option<f64> {
        let caps = self.pattern.captures(line)?;
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }
}

impl std::fmt::Debug for ProgressShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressShim")
            .field("duration_secs", &self.duration_secs)
            .finish_non_exhaustive()
    }
}

fn fraction_of(elapsed: f64, duration: f64) -> Option<f64> {
    if duration <= 0.0 || !duration.is_finite() {
        return None;
    }
    Some((elapsed / duration).clamp(0.0, 1.0))
}
