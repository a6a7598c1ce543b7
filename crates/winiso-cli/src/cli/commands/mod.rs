//! CLI command handlers. Each command is in its own file.

mod checksum;
mod download;
mod fetch;
mod resolve;

pub use checksum::run_checksum;
pub use download::run_download;
pub use fetch::{run_fetch, FetchOptions};
pub use resolve::run_resolve;
