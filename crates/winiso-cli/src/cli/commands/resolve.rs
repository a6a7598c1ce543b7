//! `winiso resolve`: one navigation attempt against an already running
//! browser. This is what each driver container executes.

use anyhow::Result;
use std::path::PathBuf;
use winiso_core::config::NavigationConfig;
use winiso_core::navigate::{resolve_link, CdpSession, NavigationError, NavigationTarget};

/// Print the resolved link on stdout. Failures surface as `NavigationError`
/// so `main` can map them to distinct exit statuses.
pub async fn run_resolve(
    nav: &NavigationConfig,
    endpoint: &str,
    dump_dir: Option<PathBuf>,
) -> Result<()> {
    let mut target = NavigationTarget::from_config(nav);
    target.dump_dir = dump_dir;

    let mut session = CdpSession::connect(endpoint, target.timeout)
        .await
        .map_err(NavigationError::from)?;
    let resolved = resolve_link(&mut session, &target).await;
    session.close().await;

    println!("{}", resolved?);
    Ok(())
}
