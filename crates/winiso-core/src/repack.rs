//! Hands the downloaded image to an external repacking tool
//! (`distrobuilder repack-windows <iso> <dest>` by default). Black box: only
//! the exit status is interpreted.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::RepackConfig;

/// `packed-<name>` next to `source`.
pub fn packed_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("packed-{}", name))
}

/// Run the configured repack command on `source`, writing `packed-<name>`.
pub async fn repack(cfg: &RepackConfig, source: &Path) -> Result<PathBuf> {
    let dest = packed_path(source);
    tracing::info!("repacking {} -> {}", source.display(), dest.display());
    let status = tokio::process::Command::new(&cfg.command)
        .args(&cfg.args)
        .arg(source)
        .arg(&dest)
        .status()
        .await
        .with_context(|| format!("failed spawning {}", cfg.command))?;
    if !status.success() {
        anyhow::bail!("{} failed for {} ({})", cfg.command, source.display(), status);
    }
    Ok(dest)
}
