//! Remote registry over HTTP with retry and backoff.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Operation          | Request                                          |
//! |--------------------|--------------------------------------------------|
//! | `find_by_metadata` | `GET /records?creatorId=..&timestamp=..`         |
//! | `find_by_hash`     | `GET /records?imageHash=..`                      |
//! | `records`          | `GET /records`                                   |
//! | `append`           | `POST /records` with a [`NewLedgerEntry`] body   |
//!
//! Lookups return a JSON array of records, oldest first; `404` is an empty
//! result. The service links appended entries into its own chain and returns
//! the stored [`LedgerRecord`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::Registry;
use crate::error::{Result, TracemarkError};
use crate::ledger::{LedgerRecord, NewLedgerEntry};

/// Connection settings for [`HttpRegistry`].
#[derive(Debug, Clone)]
pub struct HttpRegistryConfig {
    /// Service root, e.g. `https://registry.example.com/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bound on retries of transient failures.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl HttpRegistryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
        }
    }
}

/// Registry backed by a remote service.
pub struct HttpRegistry {
    client: Client,
    config: HttpRegistryConfig,
}

impl HttpRegistry {
    pub fn new(config: HttpRegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tracemark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TracemarkError::Registry(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.config.base_url)
    }

    /// Send the request built by `build`, retrying transient failures.
    ///
    /// `Ok(None)` means the service answered `404`.
    async fn send<T, F>(&self, build: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        retry_notify(
            self.build_backoff(),
            || {
                let request = build();
                async move { self.send_once(request).await }
            },
            |err: TracemarkError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Registry retry scheduled"
                );
            },
        )
        .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<Option<T>, backoff::Error<TracemarkError>> {
        let start = Instant::now();

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient registry error, will retry");
                backoff::Error::transient(TracemarkError::Registry(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent registry error");
                backoff::Error::permanent(TracemarkError::HttpError(e))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received registry response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let err = TracemarkError::Registry(format!("Registry returned status: {status}"));
            return if is_transient_status(status) {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            backoff::Error::permanent(TracemarkError::Registry(format!(
                "Failed to parse registry response: {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Registry request completed"
        );
        Ok(Some(parsed))
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }

    async fn find_newest(&self, query: &[(&str, &str)]) -> Result<Option<LedgerRecord>> {
        let url = self.records_url();
        let records: Option<Vec<LedgerRecord>> =
            self.send(|| self.client.get(&url).query(query)).await?;
        Ok(records.and_then(|mut r| r.pop()))
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn find_by_metadata(
        &self,
        creator_id: &str,
        timestamp: &str,
    ) -> Result<Option<LedgerRecord>> {
        self.find_newest(&[("creatorId", creator_id), ("timestamp", timestamp)])
            .await
    }

    async fn find_by_hash(&self, image_hash: &str) -> Result<Option<LedgerRecord>> {
        self.find_newest(&[("imageHash", image_hash)]).await
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerRecord> {
        let url = self.records_url();
        self.send(|| self.client.post(&url).json(&entry))
            .await?
            .ok_or_else(|| TracemarkError::Registry(format!("{url} not found")))
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>> {
        let url = self.records_url();
        Ok(self
            .send(|| self.client.get(&url))
            .await?
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl std::fmt::Debug for HttpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistry")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

/// Connection-level failures worth retrying.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Statuses worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let config = HttpRegistryConfig::new("http://localhost:8080/api/");
        assert_eq!(config.base_url, "http://localhost:8080/api");
        let registry = HttpRegistry::new(config).unwrap();
        assert_eq!(registry.records_url(), "http://localhost:8080/api/records");
        assert_eq!(registry.name(), "http");
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_unreachable_service_errors() {
        let mut config = HttpRegistryConfig::new("http://127.0.0.1:9");
        config.timeout = Duration::from_millis(200);
        config.max_retries = 1;
        config.initial_interval = Duration::from_millis(10);
        config.max_interval = Duration::from_millis(50);
        let registry = HttpRegistry::new(config).unwrap();

        assert!(registry.find_by_hash("abc").await.is_err());
    }
}
