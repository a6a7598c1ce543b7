//! Logging init: human-readable lines on stderr, mirrored to a file under the
//! XDG state dir when that directory is writable.
//!
//! stdout is reserved for the resolved download URI, so nothing here writes to it.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,winiso=debug,winiso_core=debug,winiso_cli=debug";

struct FileMakeWriter(fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self.0.try_clone() {
            Ok(f) => Box::new(f),
            Err(_) => Box::new(std::io::sink()),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("winiso")?;
    let log_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&log_dir)?;
    let log_file_path = log_dir.join("winiso.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;
    Ok((file, log_file_path))
}

/// Initialize logging to stderr plus `~/.local/state/winiso/winiso.log`.
///
/// When the log file cannot be opened (read-only home inside a driver
/// container, for instance) only the stderr layer is installed.
pub fn init_logging() {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match open_log_file() {
        Ok((file, path)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(FileMakeWriter(file))
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .with(file_layer)
                .init();
            tracing::debug!("winiso logging mirrored to {}", path.display());
        }
        Err(err) => {
            init_logging_stderr();
            tracing::debug!("log file unavailable ({err:#}); logging to stderr only");
        }
    }
}

/// Initialize logging to stderr only (no file).
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
