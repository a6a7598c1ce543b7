//! Chunk staging, byte accounting and the `.part` → final rename.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use crate::storage::{self, PartFile};

use super::headers::ResponseMeta;
use super::progress::{ProgressMarks, ProgressStats};
use super::{DownloadError, DownloadOptions, MetadataProblem};

/// Where a transfer stands. `temp_path` is renamed to `final_path` only after
/// `bytes_written == declared_total` and the data is synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    pub final_path: PathBuf,
    pub temp_path: PathBuf,
    pub declared_total: u64,
    pub bytes_written: u64,
}

/// Checks the response head before anything touches the disk: the status must
/// be 2xx and the declared size must be present and above `min_size`.
pub fn check_response(url: &str, meta: &ResponseMeta, min_size: u64) -> Result<u64, DownloadError> {
    if !meta.is_success() {
        return Err(DownloadError::Http {
            url: url.to_string(),
            code: meta.status.unwrap_or(0),
        });
    }
    let declared = meta
        .content_length
        .ok_or(MetadataProblem::MissingSize)?;
    if declared <= min_size {
        return Err(MetadataProblem::TooSmall {
            declared,
            minimum: min_size,
            content_type: meta.content_type.clone(),
        }
        .into());
    }
    Ok(declared)
}

/// An open transfer: a `.part` file plus a staging buffer that turns whatever
/// slice sizes the transport delivers into fixed-size chunk writes.
pub struct Transfer {
    state: TransferState,
    part: PartFile,
    staging: Vec<u8>,
    chunk_size: usize,
    marks: ProgressMarks,
    started: Instant,
    progress: Option<Sender<ProgressStats>>,
}

impl Transfer {
    /// Create `<final_path>.part` and start accounting against `declared_total`.
    pub fn begin(
        final_path: &Path,
        declared_total: u64,
        opts: &DownloadOptions,
        progress: Option<Sender<ProgressStats>>,
    ) -> Result<Self, DownloadError> {
        let temp_path = storage::temp_path(final_path);
        let part = PartFile::create(&temp_path).map_err(|source| DownloadError::Storage {
            path: temp_path.clone(),
            source,
        })?;
        let chunk_size = opts.chunk_size.max(1);
        tracing::info!(
            total = declared_total,
            "streaming {} into {}",
            final_path.display(),
            temp_path.display()
        );
        Ok(Self {
            state: TransferState {
                final_path: final_path.to_path_buf(),
                temp_path,
                declared_total,
                bytes_written: 0,
            },
            part,
            staging: Vec::with_capacity(chunk_size),
            chunk_size,
            marks: ProgressMarks::new(opts.progress_step),
            started: Instant::now(),
            progress,
        })
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Stage `data`, writing out every full chunk.
    pub fn feed(&mut self, mut data: &[u8]) -> Result<(), DownloadError> {
        while !data.is_empty() {
            let take = (self.chunk_size - self.staging.len()).min(data.len());
            self.staging.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.staging.len() == self.chunk_size {
                self.write_staged()?;
            }
        }
        Ok(())
    }

    fn write_staged(&mut self) -> Result<(), DownloadError> {
        if self.staging.is_empty() {
            return Ok(());
        }
        self.part
            .append(&self.staging)
            .map_err(|source| DownloadError::Storage {
                path: self.state.temp_path.clone(),
                source,
            })?;
        let before = self.state.bytes_written;
        self.state.bytes_written += self.staging.len() as u64;
        self.staging.clear();
        if self.marks.crossed(before, self.state.bytes_written) {
            self.report();
        }
        Ok(())
    }

    fn report(&self) {
        let stats = ProgressStats {
            bytes_done: self.state.bytes_written,
            total_bytes: self.state.declared_total,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };
        match &self.progress {
            Some(tx) => {
                let _ = tx.send(stats);
            }
            None => tracing::info!("{}", stats.line()),
        }
    }

    /// Write the last partial chunk, verify the byte count against the declared
    /// total, sync and rename to the final name.
    pub fn finish(mut self) -> Result<TransferState, DownloadError> {
        self.write_staged()?;
        if self.state.bytes_written != self.state.declared_total {
            tracing::warn!(
                "leaving {} in place after short transfer",
                self.state.temp_path.display()
            );
            return Err(DownloadError::PartialTransfer {
                expected: self.state.declared_total,
                received: self.state.bytes_written,
            });
        }
        let storage_err = |source| DownloadError::Storage {
            path: self.state.temp_path.clone(),
            source,
        };
        self.part.sync().map_err(storage_err)?;
        self.part
            .finalize(&self.state.final_path)
            .map_err(storage_err)?;
        tracing::info!("saved {}", self.state.final_path.display());
        Ok(self.state)
    }

    /// Stop after a failure: flush what was staged and leave the `.part` file
    /// on disk as evidence of the partial transfer.
    pub fn abandon(mut self) -> TransferState {
        if let Err(e) = self.write_staged() {
            tracing::debug!("could not flush staged bytes: {}", e);
        }
        let _ = self.part.sync();
        tracing::warn!(
            written = self.state.bytes_written,
            total = self.state.declared_total,
            "transfer aborted; partial data kept at {}",
            self.state.temp_path.display()
        );
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::MB;
    use std::sync::mpsc;

    fn opts(dir: &Path, chunk_size: usize, progress_step: u64) -> DownloadOptions {
        DownloadOptions {
            dest_dir: dir.to_path_buf(),
            min_size: 0,
            chunk_size,
            progress_step,
            connect_timeout: std::time::Duration::from_secs(5),
        }
    }

    fn meta(status: u32, len: Option<u64>) -> ResponseMeta {
        ResponseMeta {
            status: Some(status),
            content_length: len,
            content_type: None,
        }
    }

    #[test]
    fn check_response_requires_declared_size() {
        let err = check_response("http://x/a.iso", &meta(200, None), 0).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::IncompleteMetadata(MetadataProblem::MissingSize)
        ));
    }

    #[test]
    fn check_response_reports_content_type_of_small_response() {
        let html = ResponseMeta {
            status: Some(200),
            content_length: Some(1_245),
            content_type: Some("text/html; charset=utf-8".into()),
        };
        let err = check_response("http://x/a.iso", &html, 1000 * MB).unwrap_err();
        match err {
            DownloadError::IncompleteMetadata(MetadataProblem::TooSmall { content_type, .. }) => {
                assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
            }
            other => panic!("expected TooSmall, got {other:?}"),
        }
        let err = check_response("http://x/a.iso", &html, 1000 * MB).unwrap_err();
        assert!(err.to_string().contains("text/html"));
    }

    #[test]
    fn check_response_rejects_implausibly_small() {
        let err = check_response("http://x/a.iso", &meta(200, Some(4096)), 1000 * MB).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::IncompleteMetadata(MetadataProblem::TooSmall {
                declared: 4096,
                ..
            })
        ));
        assert_eq!(
            check_response("http://x/a.iso", &meta(200, Some(5_000_000_000)), 1000 * MB).unwrap(),
            5_000_000_000
        );
    }

    #[test]
    fn check_response_rejects_error_status() {
        let err = check_response("http://x/a.iso", &meta(403, Some(10)), 0).unwrap_err();
        assert!(matches!(err, DownloadError::Http { code: 403, .. }));
    }

    #[test]
    fn feed_writes_fixed_chunks_and_reports_on_step_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("image.iso");
        let (tx, rx) = mpsc::channel();
        let total = 25_000u64;
        let mut t = Transfer::begin(&final_path, total, &opts(dir.path(), 100, 1_000), Some(tx)).unwrap();

        // Odd slice sizes: staging must still produce 100-byte writes.
        let body: Vec<u8> = (0u8..=250).cycle().take(total as usize).collect();
        for piece in body.chunks(37) {
            t.feed(piece).unwrap();
            assert_eq!(t.state().bytes_written % 100, 0);
        }
        let state = t.finish().unwrap();

        let marks: Vec<u64> = rx.try_iter().map(|s| s.bytes_done).collect();
        assert_eq!(marks.len(), 25);
        assert!(marks.iter().all(|n| n % 1_000 == 0));
        assert_eq!(state.bytes_written, total);
        assert!(!state.temp_path.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), body);
    }

    #[test]
    fn short_body_keeps_part_file_and_no_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("image.iso");
        let mut t = Transfer::begin(&final_path, 1_000, &opts(dir.path(), 64, 0), None).unwrap();
        t.feed(&[7u8; 300]).unwrap();
        let err = t.finish().unwrap_err();
        assert!(matches!(
            err,
            DownloadError::PartialTransfer {
                expected: 1_000,
                received: 300
            }
        ));
        let part = storage::temp_path(&final_path);
        assert_eq!(std::fs::metadata(&part).unwrap().len(), 300);
        assert!(!final_path.exists());
    }

    #[test]
    fn abandon_flushes_staged_bytes_and_keeps_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("image.iso");
        let mut t = Transfer::begin(&final_path, 10_000, &opts(dir.path(), 1_000, 0), None).unwrap();
        t.feed(&[1u8; 2_500]).unwrap();
        let state = t.abandon();
        assert_eq!(state.bytes_written, 2_500);
        assert_eq!(std::fs::metadata(&state.temp_path).unwrap().len(), 2_500);
        assert!(!final_path.exists());
    }
}
