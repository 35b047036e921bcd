//! Board download worker
//!
//! Fetches the pins of a board into its working directory over a bounded
//! pool of tasks, under a shared disk quota lockout.

pub mod dispatch;
pub mod download;
pub mod http;

pub use dispatch::{Dispatched, pool_size, run_all};
pub use download::{
    DISK_USAGE_NOTE, DISK_USAGE_UNKNOWN_NOTE, DownloadGate, DownloadOutcome, Downloader,
    MAX_ATTEMPTS, Notes,
};
pub use http::{DownloadError, HttpClient};
