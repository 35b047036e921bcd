use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::error::Result;

/// Raw field map of one job, as staged by the caller
pub type JobFields = BTreeMap<String, String>;

/// Source of job parameters keyed by job token
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch the field map for `uifn`, `None` if no job is staged
    async fn fetch(&self, uifn: &str) -> Result<Option<JobFields>>;

    /// Stage (or replace) the field map for `uifn`
    async fn put(&self, uifn: &str, fields: JobFields) -> Result<()>;
}

/// Encode a job key: job:{uifn}
fn encode_job_key(uifn: &str) -> Vec<u8> {
    format!("job:{}", uifn).into_bytes()
}

/// Fjall-backed job store
///
/// Layout: partition `jobs`, key `job:{uifn}`, value = field map as JSON.
#[derive(Clone)]
pub struct FjallJobStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
}

impl FjallJobStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening job store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, jobs })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FjallJobStore {
    async fn fetch(&self, uifn: &str) -> Result<Option<JobFields>> {
        match self.jobs.get(encode_job_key(uifn))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, uifn: &str, fields: JobFields) -> Result<()> {
        let value = serde_json::to_vec(&fields)?;
        self.jobs.insert(encode_job_key(uifn), value)?;
        self.persist()?;
        debug!(uifn, fields = fields.len(), "Staged job");
        Ok(())
    }
}

/// In-process job store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobFields>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch(&self, uifn: &str) -> Result<Option<JobFields>> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(jobs.get(uifn).cloned())
    }

    async fn put(&self, uifn: &str, fields: JobFields) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(uifn.to_string(), fields);
        Ok(())
    }
}
