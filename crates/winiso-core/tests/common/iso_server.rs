//! Minimal HTTP/1.1 server standing in for the image download host.
//!
//! Serves a single static body for any GET. Can leave out Content-Length,
//! cut the body short, or answer with an error status.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct IsoServerOptions {
    /// If false, the response has no Content-Length and the body ends at close.
    pub send_length: bool,
    /// Close the connection after this many body bytes (Content-Length still
    /// declares the full size).
    pub truncate_at: Option<usize>,
    /// Status line sent with the response.
    pub status: &'static str,
}

impl Default for IsoServerOptions {
    fn default() -> Self {
        Self {
            send_length: true,
            truncate_at: None,
            status: "200 OK",
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns a download
/// URL whose last path segment is `name`. The server runs until the process exits.
pub fn start(body: Vec<u8>, name: &str) -> String {
    start_with_options(body, name, IsoServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, name: &str, opts: IsoServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{}/dl/{}?t=token&e=1", port, name)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: IsoServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let method = std::str::from_utf8(&buf[..n])
        .ok()
        .and_then(|r| r.split_whitespace().next())
        .unwrap_or("");
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let length = if opts.send_length {
        format!("Content-Length: {}\r\n", body.len())
    } else {
        String::new()
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/octet-stream\r\n{}Connection: close\r\n\r\n",
        opts.status, length
    );
    let _ = stream.write_all(head.as_bytes());
    let sent = opts.truncate_at.unwrap_or(body.len()).min(body.len());
    for piece in body[..sent].chunks(16 * 1024) {
        if stream.write_all(piece).is_err() {
            return;
        }
    }
    let _ = stream.flush();
}
