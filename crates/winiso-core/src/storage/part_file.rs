//! Sequential writer for the `.part` file of an in-progress download.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only temp file. Nothing is ever written under the final name; the
/// only way to get there is [`PartFile::finalize`].
pub struct PartFile {
    file: File,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) the temp file at `temp_path`.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file,
            temp_path: temp_path.to_path_buf(),
            written: 0,
        })
    }

    /// Append `data` at the current end of the file.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush file data to disk. Call before `finalize` for durability.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    /// Atomically rename the temp file to `final_path`, closing it first.
    /// Fails if `final_path` is on a different filesystem.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let temp_path = self.temp_path;
        drop(self.file);
        std::fs::rename(&temp_path, final_path)
    }
}
