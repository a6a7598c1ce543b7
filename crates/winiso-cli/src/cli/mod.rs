//! CLI for winiso.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use winiso_core::config;

use commands::{run_checksum, run_download, run_fetch, run_resolve, FetchOptions};

/// Top-level CLI for winiso.
#[derive(Debug, Parser)]
#[command(name = "winiso")]
#[command(about = "winiso: resolve and download Windows installer images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve the download link in isolated browser containers, print it and download the image.
    Fetch {
        /// Language label to select (matched exactly).
        #[arg(long)]
        language: Option<String>,
        /// Edition option value; default is the first numeric option.
        #[arg(long)]
        edition: Option<String>,
        /// Deadline for each form step.
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Number of rounds before giving up.
        #[arg(long, value_name = "N")]
        tries: Option<u32>,
        /// Concurrent attempts per round (0 = one per CPU).
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,
        /// Save a screenshot and page HTML here when a step times out.
        #[arg(long, value_name = "DIR")]
        dump_dir: Option<PathBuf>,
        /// Only print the link; do not download.
        #[arg(long)]
        link_only: bool,
        /// Run the configured repack tool on the downloaded image.
        #[arg(long)]
        repack: bool,
        /// Expected SHA-256 of the image (hex).
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Walk the form once against a running browser and print the download link.
    Resolve {
        /// DevTools endpoint of the browser, e.g. http://browser:9222.
        #[arg(long)]
        endpoint: String,
        /// Page hosting the form.
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        edition: Option<String>,
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Lower bound of the random delay before each form action.
        #[arg(long, value_name = "MS")]
        pacing_min_ms: Option<u64>,
        /// Upper bound (exclusive) of the random delay.
        #[arg(long, value_name = "MS")]
        pacing_max_ms: Option<u64>,
        /// Visible text of the preferred download anchor.
        #[arg(long, value_name = "TEXT", conflicts_with = "no_link_text")]
        link_text: Option<String>,
        /// Take the first download anchor regardless of its text.
        #[arg(long)]
        no_link_text: bool,
        #[arg(long, value_name = "DIR")]
        dump_dir: Option<PathBuf>,
    },

    /// Download an already resolved link into the current directory.
    Download {
        /// Direct HTTP/HTTPS URL of the image.
        url: String,
        /// Reject declared sizes at or below this many bytes.
        #[arg(long, value_name = "BYTES")]
        min_size: Option<u64>,
        /// Expected SHA-256 of the image (hex).
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                language,
                edition,
                timeout_secs,
                tries,
                parallel,
                dump_dir,
                link_only,
                repack,
                sha256,
            } => {
                apply_navigation(&mut cfg.navigation, None, language, edition, timeout_secs);
                if let Some(tries) = tries {
                    cfg.orchestration.tries = tries;
                }
                if let Some(parallel) = parallel {
                    cfg.orchestration.attempts_per_round = parallel;
                }
                if dump_dir.is_some() {
                    cfg.orchestration.dump_dir = dump_dir;
                }
                let opts = FetchOptions {
                    link_only,
                    repack,
                    sha256,
                };
                run_fetch(&cfg, opts).await?;
            }
            CliCommand::Resolve {
                endpoint,
                url,
                language,
                edition,
                timeout_secs,
                pacing_min_ms,
                pacing_max_ms,
                link_text,
                no_link_text,
                dump_dir,
            } => {
                apply_navigation(&mut cfg.navigation, url, language, edition, timeout_secs);
                apply_pacing(&mut cfg.navigation, pacing_min_ms, pacing_max_ms);
                if no_link_text {
                    cfg.navigation.link_text = None;
                } else if link_text.is_some() {
                    cfg.navigation.link_text = link_text;
                }
                run_resolve(&cfg.navigation, &endpoint, dump_dir).await?;
            }
            CliCommand::Download {
                url,
                min_size,
                sha256,
            } => {
                if let Some(min_size) = min_size {
                    cfg.download.min_size_bytes = min_size;
                }
                run_download(&cfg.download, &url, sha256.as_deref()).await?;
            }
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}

fn apply_navigation(
    nav: &mut config::NavigationConfig,
    url: Option<String>,
    language: Option<String>,
    edition: Option<String>,
    timeout_secs: Option<u64>,
) {
    if let Some(url) = url {
        nav.url = url;
    }
    if let Some(language) = language {
        nav.language = language;
    }
    if edition.is_some() {
        nav.edition = edition;
    }
    if let Some(secs) = timeout_secs {
        nav.timeout_secs = secs;
    }
}

fn apply_pacing(nav: &mut config::NavigationConfig, min_ms: Option<u64>, max_ms: Option<u64>) {
    if let Some(min_ms) = min_ms {
        nav.pacing_min_ms = min_ms;
    }
    if let Some(max_ms) = max_ms {
        nav.pacing_max_ms = max_ms;
    }
}
