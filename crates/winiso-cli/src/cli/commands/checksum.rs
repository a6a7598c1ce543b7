//! Checksum command: compute SHA-256 of a file.

use anyhow::{Context, Result};
use std::path::Path;
use winiso_core::checksum;

/// Compute and print SHA-256 of the given file.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let target = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::sha256_path(&target))
        .await
        .context("checksum task")??;
    println!("{}  {}", digest, path.display());
    Ok(())
}
