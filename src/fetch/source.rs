//! Source of feature documents for the polling transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;

use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetch::FetchResult;

/// Fetches the current feature document.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Perform one fetch.
    ///
    /// # Errors
    /// Returns [`SyncError::Network`] when the server could not be reached.
    /// Error statuses are not errors here; they come back as
    /// [`FetchStatus::Unavailable`](crate::fetch::FetchStatus::Unavailable).
    async fn fetch_features(&self) -> SyncResult<FetchResult>;

    /// Called once a changed document from this source has been installed.
    /// Only accepted documents may be used as the base of the next
    /// conditional request.
    fn record_accepted(&self, _result: &FetchResult) {}

    /// Where fetches go, for logs.
    fn target(&self) -> String;
}

/// Polls `client/features` over HTTP with conditional requests.
pub struct HttpFeatureSource {
    client: reqwest::Client,
    url: url::Url,
    etag: Mutex<Option<HeaderValue>>,
}

impl HttpFeatureSource {
    /// Create a source for `api` sending `headers` on every request.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] when the endpoint URL or HTTP client
    /// cannot be built.
    pub fn new(api: &ApiConfig, headers: HeaderMap) -> SyncResult<Self> {
        let url = api
            .features_url()
            .map_err(|e| SyncError::Config(format!("invalid api.url: {e}")))?;
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(api.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            etag: Mutex::new(None),
        })
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureSource {
    async fn fetch_features(&self) -> SyncResult<FetchResult> {
        let mut request = self.client.get(self.url.clone());
        if let Some(etag) = self.etag.lock().clone() {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::not_changed());
        }
        if !status.is_success() {
            return Ok(FetchResult::unavailable(status.as_u16()));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        tracing::debug!(url = %self.url, bytes = body.len(), "Fetched feature document");
        let result = FetchResult::changed(body);
        Ok(match etag {
            Some(etag) => result.with_etag(etag),
            None => result,
        })
    }

    fn record_accepted(&self, result: &FetchResult) {
        *self.etag.lock() = result
            .etag
            .as_deref()
            .and_then(|etag| HeaderValue::from_str(etag).ok());
    }

    fn target(&self) -> String {
        self.url.to_string()
    }
}
