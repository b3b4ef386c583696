//! Long-poll client for the analytics endpoints
//!
//! Used by the `forma-watch` binary. [`LiveClient::watch`] keeps a cursor,
//! re-polls immediately after a timeout sentinel, backs off after transport
//! or server failures, and stops on an unknown form or cancellation.

use crate::analytics::FormAnalytics;
use crate::longpoll::LongPollReply;
use forma_common::config::DEFAULT_LONGPOLL_TIMEOUT_SECS;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Slack added to the server's hold time before a request is abandoned
pub const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Pause after a failed poll before retrying
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!("forma-watch/", env!("CARGO_PKG_VERSION"));

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Server returned {0}: {1}")]
    Server(u16, String),

    #[error("Unexpected response body: {0}")]
    Parse(String),
}

impl ClientError {
    /// Transport failures and 5xx responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Server(status, _) => *status >= 500,
            ClientError::FormNotFound(_) | ClientError::Parse(_) => false,
        }
    }
}

/// HTTP client for one forma-server
pub struct LiveClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LiveClient {
    /// `hold` is the server's long-poll timeout; requests are abandoned a
    /// little after it
    pub fn new(base_url: &str, hold: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(hold + REQUEST_TIMEOUT_SLACK)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client for a server running with the default hold time
    pub fn with_default_hold(base_url: &str) -> Result<Self, ClientError> {
        Self::new(base_url, Duration::from_secs(DEFAULT_LONGPOLL_TIMEOUT_SECS))
    }

    /// Immediate snapshot
    pub async fn snapshot(&self, form_id: &str) -> Result<FormAnalytics, ClientError> {
        let url = format!("{}/api/forms/{}/analytics", self.base_url, form_id);
        self.get_json(&url, form_id).await
    }

    /// One long-poll round trip
    pub async fn poll_once(&self, form_id: &str, since_ms: i64) -> Result<LongPollReply, ClientError> {
        let url = format!(
            "{}/api/forms/{}/analytics/longpoll?sinceMs={}",
            self.base_url, form_id, since_ms
        );
        self.get_json(&url, form_id).await
    }

    /// Poll until cancelled, handing every new snapshot to `on_snapshot`
    ///
    /// Returns the last cursor on cancellation. Errors that retrying cannot
    /// fix end the loop.
    pub async fn watch<F>(
        &self,
        form_id: &str,
        since_ms: i64,
        cancel: &CancellationToken,
        mut on_snapshot: F,
    ) -> Result<i64, ClientError>
    where
        F: FnMut(&FormAnalytics),
    {
        let mut cursor = since_ms;

        loop {
            let reply = tokio::select! {
                _ = cancel.cancelled() => return Ok(cursor),
                reply = self.poll_once(form_id, cursor) => reply,
            };

            match reply {
                Ok(LongPollReply::Snapshot(snapshot)) => {
                    if let Some(watermark) = snapshot.last_response_ms {
                        cursor = cursor.max(watermark);
                    }
                    on_snapshot(&snapshot);
                }
                Ok(LongPollReply::Timeout(_)) => {
                    debug!("Long-poll for form {} timed out, re-polling", form_id);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Long-poll for form {} failed: {}; retrying", form_id, e);
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(cursor),
                        _ = tokio::time::sleep(RETRY_BACKOFF) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form_id: &str,
    ) -> Result<T, ClientError> {
        debug!(url = %url, "GET");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::FormNotFound(form_id.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Server(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
