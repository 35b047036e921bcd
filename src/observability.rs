//! Logging setup and per-job download counters

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

use crate::worker::DownloadOutcome;

/// Install the global `fmt` subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Already installed (tests, embedding) is fine
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Outcome counters for one job
#[derive(Debug, Default)]
pub struct DownloadMetrics {
    downloaded: AtomicU64,
    downloaded_bytes: AtomicU64,
    skipped: AtomicU64,
    blocked: AtomicU64,
    failed: AtomicU64,
    ignored: AtomicU64,
}

impl DownloadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &DownloadOutcome) {
        let counter = match outcome {
            DownloadOutcome::Downloaded { bytes } => {
                self.downloaded_bytes
                    .fetch_add(*bytes as u64, Ordering::Relaxed);
                &self.downloaded
            }
            DownloadOutcome::Skipped => &self.skipped,
            DownloadOutcome::Blocked => &self.blocked,
            DownloadOutcome::Failed => &self.failed,
            DownloadOutcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub downloaded: u64,
    pub downloaded_bytes: u64,
    pub skipped: u64,
    pub blocked: u64,
    pub failed: u64,
    pub ignored: u64,
}

impl MetricsSnapshot {
    pub fn total(&self) -> u64 {
        self.downloaded + self.skipped + self.blocked + self.failed + self.ignored
    }
}
