//! `winiso fetch`: resolve the link in isolated containers, then download it.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use winiso_core::config::WinisoConfig;
use winiso_core::orchestrate::{
    run_until_link, CliRuntime, ContainerAttemptRunner, DriverPlan, RoundPolicy,
};
use winiso_core::repack;

use super::download::download_link;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub link_only: bool,
    pub repack: bool,
    pub sha256: Option<String>,
}

pub async fn run_fetch(cfg: &WinisoConfig, opts: FetchOptions) -> Result<()> {
    let exe = std::env::current_exe().context("locating the winiso executable")?;
    let plan = DriverPlan::new(&cfg.orchestration, &cfg.navigation, exe);
    let runtime = Arc::new(CliRuntime::new(cfg.orchestration.runtime.clone()));
    let run_id = format!("winiso-{}", std::process::id());
    let runner = Arc::new(ContainerAttemptRunner::new(runtime, plan, run_id));
    let policy = RoundPolicy::from_config(&cfg.orchestration);

    // First Ctrl-C while attempts run tears them down; any later one (or one
    // during the download) exits at once.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt.is_cancelled() {
                std::process::exit(130);
            }
            tracing::warn!("interrupted; tearing down running attempts");
            on_interrupt.cancel();
        }
    });

    let link = run_until_link(runner, &policy, &cancel).await?;
    cancel.cancel();
    println!("{}", link);
    if opts.link_only {
        return Ok(());
    }

    let path = download_link(&cfg.download, link, opts.sha256.as_deref()).await?;
    if opts.repack {
        let packed = repack::repack(&cfg.repack, &path).await?;
        tracing::info!("repacked image written to {}", packed.display());
    }
    Ok(())
}
