//! The browser capabilities the navigation engine needs.
//!
//! Keeping the engine behind this trait lets the step sequence be tested
//! against a scripted fake instead of a real browser.

use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("devtools protocol: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("browser endpoint: {0}")]
    Endpoint(String),
    #[error("page script: {0}")]
    Script(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// One live page in a remote browser. Selectors are CSS selectors.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` in the page and wait for the navigation to settle.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// True when at least one element matching `selector` is displayed and enabled.
    async fn is_interactable(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Values of the `<option>`s of the `<select>` matching `select`, in page order.
    async fn option_values(&mut self, select: &str) -> Result<Vec<String>, BrowserError>;

    /// Make `value` the selected option of `select`, firing the change events
    /// the page listens for.
    async fn select_option(&mut self, select: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// `href` of the anchor that is, or contains, an element matching `marker`.
    /// When `link_text` is given an anchor with exactly that visible text wins;
    /// otherwise the first marked anchor is used.
    async fn download_href(
        &mut self,
        marker: &str,
        link_text: Option<&str>,
    ) -> Result<Option<String>, BrowserError>;

    /// Save a screenshot and the page HTML into `dir`, named after `label`.
    async fn capture(&mut self, dir: &Path, label: &str) -> Result<(), BrowserError>;
}
