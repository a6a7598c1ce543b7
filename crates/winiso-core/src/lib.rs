pub mod config;
pub mod logging;

pub mod checksum;
pub mod download;
pub mod link;
pub mod navigate;
pub mod orchestrate;
pub mod repack;
pub mod storage;
