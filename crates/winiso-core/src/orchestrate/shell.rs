use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::link::DownloadLink;

use super::policy::{RoundDecision, RoundPolicy};
use super::{AttemptError, AttemptId, AttemptRunner, OrchestrationError};

/// Run rounds of `policy.width()` concurrent attempts until one yields a link.
///
/// A successful attempt cancels its siblings; the round still waits for them
/// so their contexts are torn down before the link is returned. A fatal
/// attempt error (or a panicking attempt) does the same and then aborts the
/// run. Cancelling `cancel` stops the run after the current round drains.
pub async fn run_until_link<R: AttemptRunner>(
    runner: Arc<R>,
    policy: &RoundPolicy,
    cancel: &CancellationToken,
) -> Result<DownloadLink, OrchestrationError> {
    let width = policy.width().max(1);
    let mut round = 1u32;
    loop {
        tracing::info!(round, of = policy.max_rounds, attempts = width, "starting round");
        if let Some(link) = run_round(&runner, round, width, cancel).await? {
            return Ok(link);
        }
        if cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        match policy.decide(round) {
            RoundDecision::Stop => {
                tracing::error!(rounds = round, "try budget exhausted");
                return Err(OrchestrationError::Exhausted { rounds: round });
            }
            RoundDecision::NextRoundAfter(delay) => {
                if !delay.is_zero() {
                    tracing::debug!(?delay, "waiting before next round");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(OrchestrationError::Cancelled),
                    }
                }
                round += 1;
            }
        }
    }
}

async fn run_round<R: AttemptRunner>(
    runner: &Arc<R>,
    round: u32,
    width: usize,
    parent: &CancellationToken,
) -> Result<Option<DownloadLink>, OrchestrationError> {
    let cancel = parent.child_token();
    let mut join_set = JoinSet::new();
    for slot in 1..=width {
        let id = AttemptId { round, slot };
        let runner = Arc::clone(runner);
        let token = cancel.clone();
        join_set.spawn(async move { (id, runner.run_attempt(id, token).await) });
    }

    // First decisive outcome (a link or a fatal error) wins.
    let mut decided: Option<Result<DownloadLink, anyhow::Error>> = None;
    while let Some(joined) = join_set.join_next().await {
        let outcome = match joined {
            Ok((id, Ok(link))) => {
                tracing::info!(%id, "attempt produced a link");
                Ok(link)
            }
            Ok((id, Err(AttemptError::Failed(reason)))) => {
                tracing::warn!(%id, "attempt failed: {}", reason);
                continue;
            }
            Ok((id, Err(AttemptError::Cancelled))) => {
                tracing::debug!(%id, "attempt cancelled");
                continue;
            }
            Ok((id, Err(AttemptError::Fatal(e)))) => {
                tracing::error!(%id, "attempt hit a fatal error: {:#}", e);
                Err(e)
            }
            Err(join_err) => Err(anyhow::anyhow!("attempt task: {}", join_err)),
        };
        if decided.is_none() {
            decided = Some(outcome);
            cancel.cancel();
        }
    }

    match decided {
        Some(Ok(link)) => Ok(Some(link)),
        Some(Err(e)) => Err(OrchestrationError::Fatal(e)),
        None => Ok(None),
    }
}
