//! The download link handed from the navigation engine to the downloader.

use std::fmt;

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Why a string was rejected as a download link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("download link is empty")]
    Empty,
    #[error("download link is not a valid URL: {0}")]
    Invalid(String),
    #[error("download link has no usable file name in its path: {0}")]
    NoFileName(String),
}

/// A URI extracted from the form's final page.
///
/// Only checked for non-emptiness and for a path whose last segment can serve
/// as the local file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    uri: String,
    file_name: String,
}

impl DownloadLink {
    pub fn parse(raw: &str) -> Result<Self, LinkError> {
        let uri = raw.trim();
        if uri.is_empty() {
            return Err(LinkError::Empty);
        }
        let parsed = url::Url::parse(uri).map_err(|e| LinkError::Invalid(e.to_string()))?;
        let file_name = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|segment| sanitize_file_name(&percent_decode_lossy(segment)))
            .filter(|name| !name.is_empty() && name != "." && name != "..")
            .ok_or_else(|| LinkError::NoFileName(uri.to_string()))?;
        Ok(Self {
            uri: uri.to_string(),
            file_name,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Basename of the URI path, safe to use as a file name in the download directory.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

fn percent_decode_lossy(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Replaces separators and control characters with `_`, trims dots and
/// spaces at both ends and caps the result at NAME_MAX bytes.
fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
