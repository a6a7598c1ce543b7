//! Retry/orchestration shell.
//!
//! Runs rounds of independent attempts, each in its own isolated context,
//! and returns the first download link any attempt produces. Recoverable
//! attempt failures are logged and counted as "no result"; fatal ones abort
//! the run after the round's other attempts have torn down.

mod context;
mod policy;
mod runtime;
mod shell;

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::link::DownloadLink;

pub use context::{ContainerAttemptRunner, ContextNames, DriverPlan, IsolatedContext};
pub use policy::{RoundDecision, RoundPolicy};
pub use runtime::{CliRuntime, ContainerRuntime, ContainerSpec, RuntimeError};
pub use shell::run_until_link;

/// Identifies one attempt within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId {
    /// 1-based round number.
    pub round: u32,
    /// 1-based slot within the round.
    pub slot: usize,
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}-a{}", self.round, self.slot)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// This attempt produced no link; others may still succeed.
    #[error("{0}")]
    Failed(String),
    /// Stopped because another attempt already succeeded or the run was cancelled.
    #[error("attempt cancelled")]
    Cancelled,
    /// Something is wrong beyond this attempt; the whole run stops.
    #[error(transparent)]
    Fatal(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("no download link after {rounds} round(s) of attempts")]
    Exhausted { rounds: u32 },
    #[error("run cancelled")]
    Cancelled,
    #[error("fatal attempt error: {0:#}")]
    Fatal(anyhow::Error),
}

/// Runs one attempt end to end. Implementations own the attempt's isolated
/// context and must tear it down before returning, including when `cancel`
/// fires.
#[async_trait]
pub trait AttemptRunner: Send + Sync + 'static {
    async fn run_attempt(
        &self,
        id: AttemptId,
        cancel: CancellationToken,
    ) -> Result<DownloadLink, AttemptError>;
}
