//! Completion callback
//!
//! The status payload is POSTed form-encoded to the job's callback URL with
//! `Action` as a query parameter. The receiver answers with a JSON object whose
//! `code` is `0` on acceptance; any other object triggers exactly one resend.
//! Delivery is best effort and never fails the job.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::CallbackConfig;
use crate::humanize::ByteSize;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to build callback client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Success sentinel of the callback's `code` field
pub const ACCEPTED_CODE: i64 = 0;

/// Body fields sent to the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPayload {
    pub uifn: String,
    #[serde(rename = "uifnKey")]
    pub uifn_key: String,
    /// Archive size, human readable
    pub size: String,
    /// Download seconds, two decimals
    pub dtime: String,
}

impl StatusPayload {
    pub fn new(uifn: &str, uifn_key: &str, archive_bytes: u64, elapsed: Duration) -> Self {
        Self {
            uifn: uifn.to_string(),
            uifn_key: uifn_key.to_string(),
            size: ByteSize(archive_bytes).to_human_readable(),
            dtime: format!("{:.2}", elapsed.as_secs_f64()),
        }
    }
}

/// How delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Receiver answered with the success code
    Accepted { attempts: u32 },
    /// Receiver still did not accept after the resend
    Rejected { attempts: u32 },
    /// Receiver answered with something other than a JSON object; not resent
    Unconfirmed,
    /// First send failed at the transport level; not resent
    Failed,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    client: Client,
    action: String,
}

impl Reporter {
    pub fn new(config: &CallbackConfig) -> Result<Self, ReportError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            action: config.action.clone(),
        })
    }

    /// Deliver `payload`, resending once if the receiver reports a non-zero code.
    pub async fn report(&self, callback_url: &str, payload: &StatusPayload) -> ReportOutcome {
        let first = match self.send(callback_url, payload).await {
            Ok(body) => body,
            Err(e) => {
                error!(url = callback_url, error = %e, "Callback delivery failed");
                return ReportOutcome::Failed;
            }
        };

        let Some(code) = first else {
            warn!(url = callback_url, "Callback answered without a status object");
            return ReportOutcome::Unconfirmed;
        };

        if code == Some(ACCEPTED_CODE) {
            info!(url = callback_url, "Callback accepted");
            return ReportOutcome::Accepted { attempts: 1 };
        }

        warn!(url = callback_url, code = ?code, "Callback not accepted, resending");
        match self.send(callback_url, payload).await {
            Ok(Some(Some(ACCEPTED_CODE))) => {
                info!(url = callback_url, "Callback accepted on resend");
                ReportOutcome::Accepted { attempts: 2 }
            }
            Ok(body) => {
                error!(url = callback_url, response = ?body, "Callback rejected after resend");
                ReportOutcome::Rejected { attempts: 2 }
            }
            Err(e) => {
                error!(url = callback_url, error = %e, "Callback resend failed");
                ReportOutcome::Rejected { attempts: 2 }
            }
        }
    }

    /// Send once. `Ok(None)`: body was not a JSON object.
    /// `Ok(Some(code))`: object with its integer `code`, if any.
    async fn send(
        &self,
        callback_url: &str,
        payload: &StatusPayload,
    ) -> Result<Option<Option<i64>>, reqwest::Error> {
        let response = self
            .client
            .post(callback_url)
            .query(&[("Action", self.action.as_str())])
            .form(payload)
            .send()
            .await?;

        let body = response.json::<Value>().await.ok();
        Ok(body.and_then(|value| status_code(&value)))
    }
}

fn status_code(body: &Value) -> Option<Option<i64>> {
    body.as_object()
        .map(|object| object.get("code").and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_formatting() {
        let payload = StatusPayload::new(
            "board.zip",
            "key",
            3 * 1024 * 1024 / 2,
            Duration::from_millis(12_500),
        );

        assert_eq!(payload.size, "1.50MB");
        assert_eq!(payload.dtime, "12.50");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"uifn": "board.zip", "uifnKey": "key", "size": "1.50MB", "dtime": "12.50"})
        );
    }

    #[test]
    fn test_status_code_extraction() {
        assert_eq!(status_code(&json!({"code": 0})), Some(Some(0)));
        assert_eq!(status_code(&json!({"code": 1, "msg": "busy"})), Some(Some(1)));
        assert_eq!(status_code(&json!({"msg": "no code"})), Some(None));
        assert_eq!(status_code(&json!("ok")), None);
        assert_eq!(status_code(&json!([0])), None);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_resent() {
        let reporter = Reporter::new(&CallbackConfig::default()).unwrap();
        let payload = StatusPayload::new("a", "b", 0, Duration::ZERO);

        let outcome = reporter.report("http://127.0.0.1:9/cb", &payload).await;
        assert_eq!(outcome, ReportOutcome::Failed);
    }
}
