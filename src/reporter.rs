//! Status reports to an external account manager.
//!
//! Every report is a single JSON `POST` to `{base}/api/internal/{endpoint}`
//! with a 5 second timeout. Failures are logged at debug and otherwise
//! ignored; the game session never depends on the manager being reachable.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::session::{SessionState, now_ms};

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum ReportError {
    #[error("manager url not configured")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct Reporter {
    http: reqwest::Client,
    base_url: Option<String>,
    account_id: String,
}

impl Reporter {
    /// A reporter with no `base_url` accepts every call and sends nothing.
    #[must_use]
    pub fn new(base_url: Option<String>, account_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .build()
            .unwrap_or_default();
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());
        Self { http, base_url, account_id: account_id.into() }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Announce this process to the manager. Returns whether it accepted.
    pub async fn register(&self) -> bool {
        let body = json!({ "accountId": self.account_id, "pid": std::process::id() });
        match self.post("register", body).await {
            Ok(()) => {
                info!(account = %self.account_id, "reporter: registered with manager");
                true
            }
            Err(e) => {
                debug!(account = %self.account_id, error = %e, "reporter: register failed");
                false
            }
        }
    }

    pub async fn heartbeat(&self) {
        let body = json!({ "accountId": self.account_id, "timestamp": now_ms() });
        self.send("heartbeat", body).await;
    }

    pub async fn status(&self, state: &SessionState) {
        let body = json!({ "accountId": self.account_id, "data": state });
        self.send("status", body).await;
    }

    pub async fn log(&self, level: &str, message: &str) {
        let body = json!({
            "accountId": self.account_id,
            "level": level,
            "message": message,
            "timestamp": now_ms(),
        });
        self.send("log", body).await;
    }

    pub async fn online(&self, online: bool) {
        let body = json!({ "accountId": self.account_id, "online": online });
        self.send("online", body).await;
    }

    async fn send(&self, endpoint: &str, body: Value) {
        if let Err(e) = self.post(endpoint, body).await {
            debug!(account = %self.account_id, endpoint, error = %e, "reporter: report dropped");
        }
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<(), ReportError> {
        let base = self.base_url.as_deref().ok_or(ReportError::Disabled)?;
        let url = format!("{base}/api/internal/{endpoint}");
        self.http.post(&url).json(&body).send().await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "reporter_test.rs"]
mod tests;
