//! Single-item downloader
//!
//! Each pin is fetched at most twice. Shared per-job state is passed in
//! explicitly: the [`DownloadGate`] (monotonic "downloads allowed" flag) and
//! the [`Notes`] set collecting warnings for the notes file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use super::http::{HttpClient, Result};
use crate::job::{Pin, PinEntry};
use crate::quota::QuotaGate;

/// Attempts per item, first try included
pub const MAX_ATTEMPTS: u32 = 2;

pub const DISK_USAGE_NOTE: &str = "Disk usage is too high";
pub const DISK_USAGE_UNKNOWN_NOTE: &str = "Disk usage could not be determined";

/// Job-wide download permission. Starts open; once closed it stays closed.
#[derive(Debug)]
pub struct DownloadGate {
    allowed: AtomicBool,
}

impl DownloadGate {
    pub fn new() -> Self {
        Self {
            allowed: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.load(Ordering::Acquire)
    }

    /// Close the gate. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        self.allowed.swap(false, Ordering::AcqRel)
    }
}

impl Default for DownloadGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Distinct warnings gathered by all workers of a job
#[derive(Debug, Default)]
pub struct Notes {
    entries: Mutex<BTreeSet<String>>,
}

impl Notes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the note was already recorded
    pub fn add(&self, note: impl Into<String>) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(note.into())
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Notes file body: a header line naming the board, then one note per line
    pub fn render(&self, board_id: &str) -> String {
        let mut body = format!("Error board_id: {}\r\n", board_id);
        body.push_str(&self.entries().join("\r\n"));
        body
    }
}

/// What happened to one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Body written to the board directory
    Downloaded { bytes: usize },
    /// Destination file already present
    Skipped,
    /// Downloads were stopped by the disk quota
    Blocked,
    /// Both attempts failed
    Failed,
    /// Malformed pin, nothing attempted
    Ignored,
}

/// Fetches pins of one board into its working directory
#[derive(Debug, Clone)]
pub struct Downloader {
    http: HttpClient,
    quota: QuotaGate,
    referer: String,
    board_dir: PathBuf,
    quota_path: PathBuf,
}

impl Downloader {
    /// `quota_path` is the directory whose filesystem is checked after each fetch.
    pub fn new(
        http: HttpClient,
        quota: QuotaGate,
        referer: String,
        board_dir: PathBuf,
        quota_path: PathBuf,
    ) -> Self {
        Self {
            http,
            quota,
            referer,
            board_dir,
            quota_path,
        }
    }

    pub fn board_dir(&self) -> &Path {
        &self.board_dir
    }

    /// Download one pin. Never fails: errors are retried once then logged.
    pub async fn download_item(
        &self,
        entry: &PinEntry,
        gate: &DownloadGate,
        notes: &Notes,
    ) -> DownloadOutcome {
        let Some(pin) = entry.pin() else {
            return DownloadOutcome::Ignored;
        };
        let dest = self.board_dir.join(&pin.image_name);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(pin, &dest, gate, notes).await {
                Ok(outcome) => return outcome,
                Err(e) if attempt < MAX_ATTEMPTS => {
                    debug!(url = %pin.image_url, attempt, error = %e, "Download failed, retrying");
                }
                Err(e) => {
                    debug!(url = %pin.image_url, attempt, error = %e, "Download failed, giving up");
                }
            }
        }

        DownloadOutcome::Failed
    }

    async fn attempt(
        &self,
        pin: &Pin,
        dest: &Path,
        gate: &DownloadGate,
        notes: &Notes,
    ) -> Result<DownloadOutcome> {
        if !gate.is_open() {
            return Ok(DownloadOutcome::Blocked);
        }

        if tokio::fs::metadata(dest).await.is_ok_and(|m| m.is_file()) {
            return Ok(DownloadOutcome::Skipped);
        }

        debug!(path = %dest.display(), "Fetching pin");
        let bytes = self.http.fetch(&pin.image_url, &self.referer).await?;

        match self.quota.exceeded(&self.quota_path) {
            Ok(false) => {}
            Ok(true) => {
                if gate.close() {
                    warn!(
                        path = %self.quota_path.display(),
                        threshold = self.quota.threshold_percent(),
                        "Disk usage above threshold, stopping downloads"
                    );
                }
                notes.add(DISK_USAGE_NOTE);
                return Ok(DownloadOutcome::Blocked);
            }
            Err(e) => {
                if gate.close() {
                    error!(error = %e, "Disk usage check failed, stopping downloads");
                }
                notes.add(DISK_USAGE_UNKNOWN_NOTE);
                return Ok(DownloadOutcome::Blocked);
            }
        }

        // Another worker may have closed the gate while this one was fetching
        if !gate.is_open() {
            return Ok(DownloadOutcome::Blocked);
        }

        write_new_file(dest, &bytes).await?;
        Ok(DownloadOutcome::Downloaded { bytes: bytes.len() })
    }
}

/// Create `dest` (failing if it exists) and write `bytes`; a partial file is removed.
async fn write_new_file(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await?;

    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(dest).await;
        return Err(e);
    }

    Ok(())
}
