//! Response header collection and parsing.

/// The parts of a response head the downloader acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Status code of the final response (after redirects), if HTTP.
    pub status: Option<u32>,
    /// Declared size in bytes, if `Content-Length` is present and numeric.
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

impl ResponseMeta {
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |code| (200..300).contains(&code))
    }
}

/// Accumulates raw header lines as curl delivers them. A status line starts
/// a new response, so only the head of the final hop of a redirect chain is kept.
#[derive(Debug, Default)]
pub(crate) struct HeaderCollector {
    lines: Vec<String>,
}

impl HeaderCollector {
    pub(crate) fn push(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            self.lines.clear();
        }
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    pub(crate) fn meta(&self) -> ResponseMeta {
        parse_headers(&self.lines)
    }
}

/// Parse collected header lines into ResponseMeta.
pub(crate) fn parse_headers(lines: &[String]) -> ResponseMeta {
    let mut meta = ResponseMeta::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            meta.status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse::<u32>().ok());
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                meta.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("content-type") {
                meta.content_type = Some(value.to_string());
            }
        }
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_headers_status_and_length() {
        let lines = [
            "HTTP/1.1 200 OK".to_string(),
            "Content-Length: 5819484160".to_string(),
            "Content-Type: application/octet-stream".to_string(),
        ];
        let meta = parse_headers(&lines);
        assert_eq!(meta.status, Some(200));
        assert_eq!(meta.content_length, Some(5_819_484_160));
        assert_eq!(meta.content_type.as_deref(), Some("application/octet-stream"));
        assert!(meta.is_success());
    }

    #[test]
    fn parse_headers_case_insensitive_and_missing_length() {
        let lines = ["HTTP/2 404".to_string(), "content-type: text/html".to_string()];
        let meta = parse_headers(&lines);
        assert_eq!(meta.status, Some(404));
        assert_eq!(meta.content_length, None);
        assert!(!meta.is_success());
    }

    #[test]
    fn parse_headers_non_numeric_length_is_absent() {
        let lines = ["Content-Length: lots".to_string()];
        assert_eq!(parse_headers(&lines).content_length, None);
    }

    #[test]
    fn collector_keeps_only_final_hop() {
        let mut c = HeaderCollector::default();
        c.push(b"HTTP/1.1 302 Found\r\n");
        c.push(b"Location: https://cdn.example.com/Win11.iso\r\n");
        c.push(b"Content-Length: 0\r\n");
        c.push(b"\r\n");
        c.push(b"HTTP/1.1 200 OK\r\n");
        c.push(b"Content-Length: 1234\r\n");
        c.push(b"\r\n");
        let meta = c.meta();
        assert_eq!(meta.status, Some(200));
        assert_eq!(meta.content_length, Some(1234));
    }
}
