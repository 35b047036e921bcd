//! Disk quota gate
//!
//! Answers whether used space on the filesystem holding a directory exceeds a
//! percentage threshold. Read-only, safe to call from any number of workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("Failed to stat filesystem at {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Disk usage checks are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, QuotaError>;

/// Reports used-space percentage for the filesystem containing a path
pub trait DiskProbe: Send + Sync {
    fn used_percent(&self, path: &Path) -> Result<f64>;
}

/// `statvfs(3)` backed probe.
///
/// Usage is computed as `used / (used + available to unprivileged users)`,
/// so reserved blocks count as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl DiskProbe for StatvfsProbe {
    #[cfg(unix)]
    #[allow(clippy::unnecessary_cast)]
    fn used_percent(&self, path: &Path) -> Result<f64> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let stat_error = |source: std::io::Error| QuotaError::Stat {
            path: path.to_path_buf(),
            source,
        };

        let c = CString::new(path.as_os_str().as_bytes()).map_err(|e| stat_error(e.into()))?;
        let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c.as_ptr(), &mut s) };
        if rc != 0 {
            return Err(stat_error(std::io::Error::last_os_error()));
        }

        let frsize = s.f_frsize as u64;
        let used = (s.f_blocks as u64)
            .saturating_sub(s.f_bfree as u64)
            .saturating_mul(frsize);
        let avail = (s.f_bavail as u64).saturating_mul(frsize);
        let total = used.saturating_add(avail);
        if total == 0 {
            return Ok(0.0);
        }

        Ok(used as f64 / total as f64 * 100.0)
    }

    #[cfg(not(unix))]
    fn used_percent(&self, _path: &Path) -> Result<f64> {
        Err(QuotaError::Unsupported)
    }
}

/// Threshold check over a [`DiskProbe`]
#[derive(Clone)]
pub struct QuotaGate {
    probe: Arc<dyn DiskProbe>,
    threshold_percent: u8,
}

impl QuotaGate {
    pub fn new(threshold_percent: u8) -> Self {
        Self::with_probe(Arc::new(StatvfsProbe), threshold_percent)
    }

    pub fn with_probe(probe: Arc<dyn DiskProbe>, threshold_percent: u8) -> Self {
        Self {
            probe,
            threshold_percent,
        }
    }

    pub fn threshold_percent(&self) -> u8 {
        self.threshold_percent
    }

    /// True when used space at `path` is strictly above the threshold
    pub fn exceeded(&self, path: &Path) -> Result<bool> {
        let used = self.probe.used_percent(path)?;
        Ok(used > f64::from(self.threshold_percent))
    }
}

impl std::fmt::Debug for QuotaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGate")
            .field("threshold_percent", &self.threshold_percent)
            .finish_non_exhaustive()
    }
}

/// One-shot check against the real filesystem
pub fn check_quota(path: &Path, threshold_percent: u8) -> Result<bool> {
    QuotaGate::new(threshold_percent).exceeded(path)
}
