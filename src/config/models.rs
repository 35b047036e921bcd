use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Download and archive settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Parent directory; boards are staged under `{download_dir}/{board_id}`
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Used-space percentage above which downloads stop
    #[serde(default = "default_disk_limit_percent")]
    pub disk_limit_percent: u8,
    #[serde(default = "default_notes_file")]
    pub notes_file: String,
    /// Extensions (without dot) never added to the archive
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            disk_limit_percent: default_disk_limit_percent(),
            notes_file: default_notes_file(),
            excluded_extensions: default_excluded_extensions(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("data/downloads")
}

fn default_disk_limit_percent() -> u8 {
    80
}

fn default_notes_file() -> String {
    "README.txt".to_string()
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["zip".to_string(), "lock".to_string(), "tar".to_string()]
}

/// Image fetch client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.181 Safari/537.36".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Completion callback settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_timeout_secs")]
    pub timeout_secs: u64,
    /// Value of the `Action` query parameter
    #[serde(default = "default_callback_action")]
    pub action: String,
}

impl CallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_callback_timeout_secs(),
            action: default_callback_action(),
        }
    }
}

fn default_callback_timeout_secs() -> u64 {
    5
}

fn default_callback_action() -> String {
    "FIRST_STATUS".to_string()
}

/// Embedded job parameter store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/jobs")
}
