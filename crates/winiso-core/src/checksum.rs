//! SHA-256 of the downloaded image, computed after the rename so it never
//! slows the streaming path.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash `path` and compare with `expected` (hex, case-insensitive).
/// Returns the computed digest on success.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<String> {
    let digest = sha256_path(path)?;
    if !digest.eq_ignore_ascii_case(expected.trim()) {
        anyhow::bail!(
            "SHA-256 mismatch for {}: expected {}, got {}",
            path.display(),
            expected.trim(),
            digest
        );
    }
    Ok(digest)
}
