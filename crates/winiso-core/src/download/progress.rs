//! Progress reporting for the artifact download.
//!
//! Consumers can compute rate = bytes_done / elapsed_secs and
//! ETA = (total_bytes - bytes_done) / rate.

/// Decimal megabyte, the unit progress lines are printed in.
pub const MB: u64 = 1_000_000;

/// Snapshot of download progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Bytes flushed to the `.part` file so far.
    pub bytes_done: u64,
    /// Declared size of the artifact.
    pub total_bytes: u64,
    /// Elapsed time since the first byte was written (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }

    /// `"<done>MB / <total>MB - <pct>%"` with a two-decimal percentage.
    pub fn line(&self) -> String {
        format!(
            "{}MB / {}MB - {:.2}%",
            self.bytes_done / MB,
            self.total_bytes / MB,
            self.fraction() * 100.0
        )
    }
}

/// Decides when a progress line is due: every time the running total crosses
/// a multiple of `step`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMarks {
    step: u64,
}

impl ProgressMarks {
    /// A `step` of 0 disables progress lines.
    pub fn new(step: u64) -> Self {
        Self { step }
    }

    /// True if going from `before` to `after` bytes crossed (or landed on) a step boundary.
    pub fn crossed(&self, before: u64, after: u64) -> bool {
        self.step > 0 && after / self.step > before / self.step
    }
}
