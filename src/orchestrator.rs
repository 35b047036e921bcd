//! Runs one board job end to end
//!
//! `Init → DirectoryReady → QuotaChecked → Downloading → Archived → Reported → Cleaned`
//!
//! Directory setup, the initial quota stat and archiving are fatal when they
//! fail. Per-item download errors, notes-file and cleanup errors are logged
//! and the job carries on. Callback delivery never affects the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::archive::{ArchiveError, ArchiveResult, Archiver, ZipArchiver};
use crate::config::Config;
use crate::job::{DecodeError, Job, JobStore, PinEntry, StoreError};
use crate::observability::{DownloadMetrics, MetricsSnapshot};
use crate::quota::{DiskProbe, QuotaError, QuotaGate, StatvfsProbe};
use crate::report::{ReportError, ReportOutcome, Reporter, StatusPayload};
use crate::worker::{
    DISK_USAGE_NOTE, DownloadError, DownloadGate, Downloader, HttpClient, Notes, pool_size,
    run_all,
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("No job staged for {0}")]
    NotFound(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Disk quota check failed: {0}")]
    Quota(#[from] QuotaError),

    #[error("Archiving failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Archive task aborted: {0}")]
    ArchiveTask(String),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] DownloadError),

    #[error("Callback client setup failed: {0}")]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    DirectoryReady,
    QuotaChecked,
    Downloading,
    Archived,
    Reported,
    Cleaned,
}

/// Summary of a finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub uifn: String,
    pub board_id: String,
    pub archive: ArchiveResult,
    /// Download phase only, archiving excluded
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
    pub notes: Vec<String>,
    pub callback: ReportOutcome,
}

pub struct Orchestrator {
    config: Config,
    store: Arc<dyn JobStore>,
    archiver: Arc<dyn Archiver>,
    probe: Arc<dyn DiskProbe>,
    http: HttpClient,
    reporter: Reporter,
}

impl Orchestrator {
    pub fn new(config: Config, store: Arc<dyn JobStore>) -> Result<Self> {
        let http = HttpClient::new(&config.http)?;
        let reporter = Reporter::new(&config.callback)?;
        let archiver = Arc::new(ZipArchiver::new(
            config.worker.excluded_extensions.clone(),
        ));

        Ok(Self {
            config,
            store,
            archiver,
            probe: Arc::new(StatvfsProbe),
            http,
            reporter,
        })
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn DiskProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Run the job staged under `uifn`
    pub async fn run(&self, uifn: &str) -> Result<JobReport> {
        let mut state = JobState::Init;

        let fields = self
            .store
            .fetch(uifn)
            .await?
            .ok_or_else(|| JobError::NotFound(uifn.to_string()))?;
        let job = Job::from_fields(uifn, &fields, self.config.worker.disk_limit_percent)?;

        let download_dir = self.config.worker.download_dir.clone();
        let board_dir = download_dir.join(&job.board_id);
        tokio::fs::create_dir_all(&board_dir)
            .await
            .map_err(|source| JobError::Setup {
                path: board_dir.clone(),
                source,
            })?;
        advance(&mut state, JobState::DirectoryReady, &job);

        let quota = QuotaGate::with_probe(Arc::clone(&self.probe), job.disk_limit_percent);
        let gate = Arc::new(DownloadGate::new());
        let notes = Arc::new(Notes::new());
        if quota.exceeded(&download_dir)? {
            gate.close();
            notes.add(DISK_USAGE_NOTE);
            warn!(
                uifn,
                path = %download_dir.display(),
                threshold = job.disk_limit_percent,
                "Disk usage above threshold before download"
            );
        }
        advance(&mut state, JobState::QuotaChecked, &job);

        let downloader = Arc::new(Downloader::new(
            self.http.clone(),
            quota,
            job.referer(),
            board_dir.clone(),
            download_dir.clone(),
        ));
        let metrics = Arc::new(DownloadMetrics::new());
        let workers = pool_size(job.pins.len());
        advance(&mut state, JobState::Downloading, &job);

        let dispatched = {
            let gate = Arc::clone(&gate);
            let notes = Arc::clone(&notes);
            let metrics = Arc::clone(&metrics);
            run_all(job.pins.clone(), workers, move |entry: PinEntry| {
                let downloader = Arc::clone(&downloader);
                let gate = Arc::clone(&gate);
                let notes = Arc::clone(&notes);
                let metrics = Arc::clone(&metrics);
                async move {
                    let outcome = downloader.download_item(&entry, &gate, &notes).await;
                    metrics.record(&outcome);
                    outcome
                }
            })
            .await
        };
        let snapshot = metrics.snapshot();
        info!(
            uifn,
            pins = job.pins.len(),
            workers,
            elapsed_secs = dispatched.elapsed.as_secs_f64(),
            downloaded = snapshot.downloaded,
            skipped = snapshot.skipped,
            blocked = snapshot.blocked,
            failed = snapshot.failed,
            ignored = snapshot.ignored,
            "Board download finished"
        );

        if !notes.is_empty() {
            self.write_notes(&board_dir, &job, &notes).await;
        }

        let archive = self.archive(board_dir.clone(), download_dir.join(&job.uifn)).await?;
        advance(&mut state, JobState::Archived, &job);

        if let Err(e) = tokio::fs::remove_dir_all(&board_dir).await {
            error!(uifn, path = %board_dir.display(), error = %e, "Failed to remove board directory");
        }

        let payload = StatusPayload::new(&job.uifn, &job.uifn_key, archive.size, dispatched.elapsed);
        let callback = self.reporter.report(&job.callback_url, &payload).await;
        info!(uifn, outcome = ?callback, "Callback finished");
        advance(&mut state, JobState::Reported, &job);
        advance(&mut state, JobState::Cleaned, &job);

        Ok(JobReport {
            uifn: job.uifn,
            board_id: job.board_id,
            archive,
            elapsed: dispatched.elapsed,
            metrics: snapshot,
            notes: notes.entries(),
            callback,
        })
    }

    async fn write_notes(&self, board_dir: &Path, job: &Job, notes: &Notes) {
        let path = board_dir.join(&self.config.worker.notes_file);
        let body = notes.render(&job.board_id);

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(body.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            error!(uifn = %job.uifn, path = %path.display(), error = %e, "Failed to write notes file");
        }
    }

    async fn archive(&self, source: PathBuf, dest: PathBuf) -> Result<ArchiveResult> {
        let archiver = Arc::clone(&self.archiver);
        let result = tokio::task::spawn_blocking(move || archiver.archive(&source, &dest))
            .await
            .map_err(|e| JobError::ArchiveTask(e.to_string()))??;
        Ok(result)
    }
}

fn advance(state: &mut JobState, next: JobState, job: &Job) {
    info!(uifn = %job.uifn, board_id = %job.board_id, from = ?state, to = ?next, "Job state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{
        FIELD_BOARD_ID, FIELD_BOARD_PINS, FIELD_CALLBACK_URL, FIELD_MAX_BOARD_NUMBER, FIELD_SITE,
        FIELD_UIFN_KEY, JobFields, MemoryJobStore,
    };
    use serde_json::json;
    use std::fs::File;
    use tempfile::TempDir;

    struct FixedProbe(f64);

    impl DiskProbe for FixedProbe {
        fn used_percent(&self, _path: &Path) -> crate::quota::Result<f64> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    impl DiskProbe for FailingProbe {
        fn used_percent(&self, path: &Path) -> crate::quota::Result<f64> {
            Err(QuotaError::Stat {
                path: path.to_path_buf(),
                source: std::io::Error::other("stat refused"),
            })
        }
    }

    fn config(download_dir: &Path) -> Config {
        let mut config = Config::default();
        config.worker.download_dir = download_dir.to_path_buf();
        config.callback.timeout_secs = 1;
        config
    }

    fn fields() -> JobFields {
        let pins = json!([
            {"imgUrl": "http://127.0.0.1:9/a.jpg", "imgName": "a.jpg"},
            {"imgUrl": "http://127.0.0.1:9/b.jpg", "imgName": "b.jpg"}
        ]);
        let mut fields = JobFields::new();
        fields.insert(FIELD_BOARD_PINS.to_string(), pins.to_string());
        fields.insert(FIELD_CALLBACK_URL.to_string(), "http://127.0.0.1:9/cb".to_string());
        fields.insert(FIELD_MAX_BOARD_NUMBER.to_string(), "10".to_string());
        fields.insert(FIELD_BOARD_ID.to_string(), "555".to_string());
        fields.insert(FIELD_SITE.to_string(), "2".to_string());
        fields.insert(FIELD_UIFN_KEY.to_string(), "key".to_string());
        fields
    }

    async fn store_with_job(uifn: &str) -> Arc<MemoryJobStore> {
        let store = Arc::new(MemoryJobStore::new());
        store.put(uifn, fields()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator =
            Orchestrator::new(config(temp_dir.path()), Arc::new(MemoryJobStore::new())).unwrap();

        let result = orchestrator.run("nope.zip").await;
        assert!(matches!(result, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_over_quota_at_start_archives_notes_only() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_job("555.zip").await;
        let orchestrator = Orchestrator::new(config(temp_dir.path()), store)
            .unwrap()
            .with_probe(Arc::new(FixedProbe(95.0)));

        let report = orchestrator.run("555.zip").await.unwrap();

        assert_eq!(report.metrics.blocked, 2);
        assert_eq!(report.metrics.downloaded, 0);
        assert_eq!(report.notes, vec![DISK_USAGE_NOTE.to_string()]);
        assert_eq!(report.callback, ReportOutcome::Failed);
        assert!(!temp_dir.path().join("555").exists());

        let archive_path = temp_dir.path().join("555.zip");
        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut body = String::new();
        std::io::Read::read_to_string(&mut zip.by_name("555/README.txt").unwrap(), &mut body)
            .unwrap();
        assert_eq!(body, "Error board_id: 555\r\nDisk usage is too high");
    }

    #[tokio::test]
    async fn test_initial_stat_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_job("555.zip").await;
        let orchestrator = Orchestrator::new(config(temp_dir.path()), store)
            .unwrap()
            .with_probe(Arc::new(FailingProbe));

        let result = orchestrator.run("555.zip").await;
        assert!(matches!(result, Err(JobError::Quota(_))));
        assert!(!temp_dir.path().join("555.zip").exists());
    }

    #[tokio::test]
    async fn test_unwritable_download_dir_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("downloads");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = store_with_job("555.zip").await;
        let orchestrator = Orchestrator::new(config(&blocker), store).unwrap();

        let result = orchestrator.run("555.zip").await;
        assert!(matches!(result, Err(JobError::Setup { .. })));
    }

    #[tokio::test]
    async fn test_failed_downloads_still_archive() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_job("555.zip").await;
        let orchestrator = Orchestrator::new(config(temp_dir.path()), store)
            .unwrap()
            .with_probe(Arc::new(FixedProbe(10.0)));

        let report = orchestrator.run("555.zip").await.unwrap();

        assert_eq!(report.metrics.failed, 2);
        assert!(report.notes.is_empty());
        assert_eq!(report.archive.entries, 0);
        assert!(temp_dir.path().join("555.zip").exists());
    }
}
