//! HTTP client for the remote batch processor.
//!
//! Wraps the processor's batch submission and progress endpoints using
//! [`reqwest`]. Endpoint paths are chosen by the caller (one pair per job
//! kind); this client only knows the base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::gateway::{
    GatewayError, ProgressGateway, ProgressSnapshot, SubmissionGateway, SubmitReceipt,
};

/// HTTP client for one processor deployment.
#[derive(Clone)]
pub struct ProcessorApi {
    client: reqwest::Client,
    api_url: String,
}

impl ProcessorApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8080/api`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GatewayError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SubmissionGateway for ProcessorApi {
    /// Sends a `POST {api_url}{endpoint}` with the batch payload.
    async fn submit(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<SubmitReceipt, GatewayError> {
        let response = self
            .client
            .post(self.url(endpoint))
            .json(payload)
            .send()
            .await?;

        let receipt: SubmitReceipt = Self::parse_response(response).await?;
        tracing::debug!(
            endpoint,
            job_id = %receipt.job_id,
            item_count = receipt.item_count,
            "Batch accepted by processor",
        );
        Ok(receipt)
    }
}

#[async_trait]
impl ProgressGateway for ProcessorApi {
    /// Sends a `GET {api_url}{endpoint}`. A 404 means the processor has
    /// no record of the job (finished and purged, or never existed).
    async fn fetch_progress(
        &self,
        endpoint: &str,
    ) -> Result<Option<ProgressSnapshot>, GatewayError> {
        let response = self.client.get(self.url(endpoint)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::parse_response(response).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let api = ProcessorApi::new("http://host:8080/api/");
        assert_eq!(api.api_url(), "http://host:8080/api");
        assert_eq!(
            api.url("/screening/batches"),
            "http://host:8080/api/screening/batches"
        );
        assert_eq!(
            api.url("screening/batches/7"),
            "http://host:8080/api/screening/batches/7"
        );
    }
}
