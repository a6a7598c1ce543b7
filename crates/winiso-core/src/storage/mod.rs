//! Disk I/O and file lifecycle.
//!
//! Downloads are streamed into `<name>.part` and renamed to `<name>` only once
//! every declared byte is on disk. A failed transfer leaves the `.part` file.

mod part_file;

pub use part_file::PartFile;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
