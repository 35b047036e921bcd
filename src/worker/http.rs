//! HTTP client for fetching board images

use bytes::Bytes;
use reqwest::{Client, header};
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Unexpected status HTTP {0}")]
    Status(u16),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Image downloader shared by all workers of a job
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue one GET and return the full body. No retry.
    pub async fn fetch(&self, url: &str, referer: &str) -> Result<Bytes> {
        debug!(url, "Starting download");

        let response = self
            .client
            .get(url)
            .header(header::REFERER, referer)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(url, size = bytes.len(), "Download completed");
        Ok(bytes)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::Timeout
    } else {
        DownloadError::RequestFailed(e.to_string())
    }
}
