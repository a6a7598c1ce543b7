use std::fmt;
use std::time::Duration;

use crate::link::LinkError;

use super::session::BrowserError;

/// The stage of the form a failure belongs to. Also names diagnostic dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Edition,
    EditionSubmit,
    Language,
    LanguageSubmit,
    DownloadLinks,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::Edition => "product-edition",
            Step::EditionSubmit => "submit-product-edition",
            Step::Language => "product-languages",
            Step::LanguageSubmit => "submit-sku",
            Step::DownloadLinks => "product-download-type",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every variant fails the current attempt only; none of them is fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("timed out after {}s waiting for {step}", timeout.as_secs_f32())]
    Timeout { step: Step, timeout: Duration },
    #[error("no {control} option matches {wanted:?}")]
    SelectionNotFound { control: Step, wanted: String },
    #[error("download page has no usable link")]
    MissingLink,
    #[error(transparent)]
    BadLink(#[from] LinkError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl NavigationError {
    /// Process exit status used by `winiso resolve` so the supervising process
    /// can tell failure classes apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            NavigationError::Timeout { .. } => 3,
            NavigationError::SelectionNotFound { .. } => 4,
            NavigationError::MissingLink | NavigationError::BadLink(_) => 5,
            NavigationError::Browser(_) => 6,
        }
    }
}
