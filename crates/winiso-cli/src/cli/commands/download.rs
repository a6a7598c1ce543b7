//! `winiso download`: stream a resolved link into the current directory.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc;
use winiso_core::checksum;
use winiso_core::config::DownloadConfig;
use winiso_core::download::{self, DownloadOptions, ProgressStats, MB};
use winiso_core::link::DownloadLink;

pub async fn run_download(cfg: &DownloadConfig, url: &str, sha256: Option<&str>) -> Result<()> {
    let link = DownloadLink::parse(url).map_err(download::DownloadError::from)?;
    download_link(cfg, link, sha256).await?;
    Ok(())
}

/// Download `link` into the current directory, print progress to stderr and
/// check the SHA-256 of the result. Returns the final path.
pub async fn download_link(
    cfg: &DownloadConfig,
    link: DownloadLink,
    sha256: Option<&str>,
) -> Result<PathBuf> {
    let dest_dir = std::env::current_dir()?;
    let opts = DownloadOptions::from_config(cfg, &dest_dir);

    let (progress_tx, progress_rx) = mpsc::channel::<ProgressStats>();
    let printer = std::thread::spawn(move || {
        for stats in progress_rx {
            let rate = stats.bytes_per_sec() / MB as f64;
            let eta = stats
                .eta_secs()
                .map(|s| format!("{:.0}s", s))
                .unwrap_or_else(|| "?".to_string());
            eprintln!("{}  {:.1} MB/s  ETA {}", stats.line(), rate, eta);
        }
    });

    let state = tokio::task::spawn_blocking(move || download::download(&link, &opts, Some(progress_tx)))
        .await
        .context("download task")??;
    let _ = printer.join();

    let path = state.final_path;
    let target = path.clone();
    let expected = sha256.map(str::to_string);
    let digest = tokio::task::spawn_blocking(move || match expected {
        Some(hex) => checksum::verify_sha256(&target, &hex),
        None => checksum::sha256_path(&target),
    })
    .await
    .context("checksum task")??;
    tracing::info!(sha256 = %digest, bytes = state.bytes_written, "downloaded {}", path.display());
    Ok(path)
}
