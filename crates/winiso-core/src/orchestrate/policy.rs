use std::time::Duration;

use crate::config::OrchestrationConfig;

/// What to do after a round produced no link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDecision {
    /// The try budget is spent.
    Stop,
    /// Start another round after the given delay.
    NextRoundAfter(Duration),
}

/// Try budget and pacing of attempt rounds.
#[derive(Debug, Clone, Copy)]
pub struct RoundPolicy {
    /// Maximum number of rounds (including the first).
    pub max_rounds: u32,
    /// Concurrent attempts per round; 0 means one per available CPU.
    pub attempts_per_round: usize,
    /// Base delay between rounds (0 = immediately).
    pub base_delay: Duration,
    /// Upper bound on the delay between rounds.
    pub max_delay: Duration,
}

impl Default for RoundPolicy {
    fn default() -> Self {
        Self::from_config(&OrchestrationConfig::default())
    }
}

impl RoundPolicy {
    pub fn from_config(cfg: &OrchestrationConfig) -> Self {
        Self {
            max_rounds: cfg.tries.max(1),
            attempts_per_round: cfg.attempts_per_round,
            base_delay: Duration::from_millis(cfg.round_delay_ms),
            max_delay: Duration::from_secs(cfg.max_round_delay_secs),
        }
    }

    /// Number of attempts started per round.
    pub fn width(&self) -> usize {
        if self.attempts_per_round > 0 {
            return self.attempts_per_round;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Decide after round `round` (1-based) came back empty.
    pub fn decide(&self, round: u32) -> RoundDecision {
        if round >= self.max_rounds {
            return RoundDecision::Stop;
        }
        // base * 2^(round-1), capped.
        let exp = 1u32 << round.saturating_sub(1).min(8);
        RoundDecision::NextRoundAfter(self.base_delay.saturating_mul(exp).min(self.max_delay))
    }
}
