//! Drives the two-stage edition/language form to the final download link.
//!
//! The engine only talks to a [`BrowserSession`]; [`CdpSession`] is the real
//! implementation over the DevTools protocol.

mod cdp;
mod engine;
mod error;
mod pacing;
mod select;
mod session;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::NavigationConfig;

pub use cdp::CdpSession;
pub use engine::resolve_link;
pub use error::{NavigationError, Step};
pub use pacing::Pacing;
pub use select::{is_edition_id, payload_language, pick_edition, pick_language, EditionPolicy};
pub use session::{BrowserError, BrowserSession};

/// CSS selectors of the controls the form is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub edition_select: String,
    pub edition_submit: String,
    pub language_select: String,
    pub language_submit: String,
    /// Marker carried by the download anchors on the last page.
    pub download_marker: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            edition_select: "#product-edition".to_string(),
            edition_submit: "#submit-product-edition".to_string(),
            language_select: "#product-languages".to_string(),
            language_submit: "#submit-sku".to_string(),
            download_marker: ".product-download-type".to_string(),
        }
    }
}

/// Everything one navigation attempt needs to know.
#[derive(Debug, Clone)]
pub struct NavigationTarget {
    pub url: String,
    pub edition: EditionPolicy,
    pub language: String,
    /// Deadline for each wait-until-interactable step.
    pub timeout: Duration,
    /// Interval between readiness checks while waiting.
    pub poll_interval: Duration,
    pub pacing: Pacing,
    pub link_text: Option<String>,
    /// Where to save a screenshot and page HTML when a step times out.
    pub dump_dir: Option<PathBuf>,
    pub layout: PageLayout,
}

impl NavigationTarget {
    pub fn from_config(cfg: &NavigationConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            edition: cfg
                .edition
                .clone()
                .map(EditionPolicy::Exact)
                .unwrap_or_default(),
            language: cfg.language.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            poll_interval: Duration::from_millis(250),
            pacing: Pacing::uniform_ms(cfg.pacing_min_ms, cfg.pacing_max_ms),
            link_text: cfg.link_text.clone(),
            dump_dir: None,
            layout: PageLayout::default(),
        }
    }
}
