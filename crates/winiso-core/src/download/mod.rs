//! Chunked single-stream downloader for the resolved installer image.
//!
//! One GET via libcurl (the `curl` crate). The response head is validated
//! before the first body byte is accepted; body bytes are staged into
//! fixed-size chunks, appended to `<name>.part` and the file is renamed to
//! `<name>` once the declared size has been reached.
//! Runs in the current thread; call from `spawn_blocking` if used from async code.

mod headers;
mod progress;
mod transfer;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::config::DownloadConfig;
use crate::link::{DownloadLink, LinkError};

use headers::HeaderCollector;

pub use headers::ResponseMeta;
pub use progress::{ProgressMarks, ProgressStats, MB};
pub use transfer::{check_response, Transfer, TransferState};

/// Why the response cannot be trusted to be the real artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataProblem {
    #[error("response has no Content-Length; cannot verify completeness")]
    MissingSize,
    /// An error page served in place of the image usually shows up here, so
    /// the response's content type is kept for the report.
    #[error(
        "declared size of {declared} bytes is not above the {minimum}-byte minimum (content type {})",
        content_type.as_deref().unwrap_or("unknown")
    )]
    TooSmall {
        declared: u64,
        minimum: u64,
        content_type: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Missing or implausible declared size. Not retried.
    #[error("incomplete metadata: {0}")]
    IncompleteMetadata(#[from] MetadataProblem),
    #[error("GET {url} returned HTTP {code}")]
    Http { url: String, code: u32 },
    #[error("transfer failed: {0}")]
    Transport(#[from] curl::Error),
    /// Body ended before the declared size was reached.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    #[error(transparent)]
    InvalidLink(#[from] LinkError),
    #[error("storage ({}): {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knobs for one download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Directory the final file is placed in.
    pub dest_dir: PathBuf,
    /// Declared sizes at or below this are rejected.
    pub min_size: u64,
    pub chunk_size: usize,
    /// Emit a progress report each time this many bytes have been written (0 = never).
    pub progress_step: u64,
    pub connect_timeout: Duration,
}

impl DownloadOptions {
    pub fn from_config(cfg: &DownloadConfig, dest_dir: &Path) -> Self {
        Self {
            dest_dir: dest_dir.to_path_buf(),
            min_size: cfg.min_size_bytes,
            chunk_size: cfg.chunk_bytes,
            progress_step: cfg.progress_step_bytes,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
        }
    }
}

/// Streams `link` into `opts.dest_dir/<basename of the link path>`.
///
/// Fails before creating any file when the response is not 2xx, lacks a
/// `Content-Length`, or declares a size at or below `opts.min_size`. A failure
/// mid-stream leaves the `.part` file and never produces the final name.
/// Progress reports go to `progress` when given, otherwise to the log.
pub fn download(
    link: &DownloadLink,
    opts: &DownloadOptions,
    progress: Option<Sender<ProgressStats>>,
) -> Result<TransferState, DownloadError> {
    let final_path = opts.dest_dir.join(link.file_name());
    let headers = RefCell::new(HeaderCollector::default());
    let mut transfer: Option<Transfer> = None;
    let mut failure: Option<DownloadError> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(link.as_str())?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    let open = |meta: &ResponseMeta| -> Result<Transfer, DownloadError> {
        let declared = check_response(link.as_str(), meta, opts.min_size)?;
        Transfer::begin(&final_path, declared, opts, progress.clone())
    };

    let performed = {
        let mut handle = easy.transfer();
        handle.header_function(|line| {
            headers.borrow_mut().push(line);
            true
        })?;
        handle.write_function(|data| {
            let t = match transfer.as_mut() {
                Some(t) => t,
                None => match open(&headers.borrow().meta()) {
                    Ok(t) => transfer.insert(t),
                    Err(e) => {
                        failure = Some(e);
                        return Ok(0); // abort transfer
                    }
                },
            };
            match t.feed(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    tracing::warn!("download write failed: {}", e);
                    failure = Some(e);
                    Ok(0)
                }
            }
        })?;
        handle.perform()
    };

    if let Some(err) = failure {
        if let Some(t) = transfer {
            t.abandon();
        }
        return Err(err);
    }
    if let Err(e) = performed {
        if let Some(t) = transfer {
            t.abandon();
        }
        return Err(DownloadError::Transport(e));
    }

    // No body callback at all (empty body): the head still has to pass.
    let transfer = match transfer {
        Some(t) => t,
        None => open(&headers.borrow().meta())?,
    };
    transfer.finish()
}
