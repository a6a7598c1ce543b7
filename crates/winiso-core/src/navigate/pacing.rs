//! Randomized delay before each form action.
//!
//! A fixed, instant cadence is easy for the remote form to flag as automated,
//! so every action waits a random amount drawn uniformly from a small window.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// No delay (tests, local debugging).
    Disabled,
    /// Uniform in `[min, max)`.
    Uniform { min: Duration, max: Duration },
}

impl Pacing {
    pub fn uniform_ms(min_ms: u64, max_ms: u64) -> Self {
        Pacing::Uniform {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// Draw the next delay.
    pub fn next_delay(&self) -> Duration {
        match *self {
            Pacing::Disabled => Duration::ZERO,
            Pacing::Uniform { min, max } => {
                let lo = min.as_millis() as u64;
                let hi = max.as_millis() as u64;
                if hi <= lo {
                    return min;
                }
                Duration::from_millis(rand::rng().random_range(lo..hi))
            }
        }
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!(?delay, "pacing");
            tokio::time::sleep(delay).await;
        }
    }
}
