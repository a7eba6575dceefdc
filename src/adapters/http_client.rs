use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::Client;
use tracing::Instrument;

use crate::ports::http_client::{
    HttpClient, HttpClientError, HttpClientResult, OutboundRequest, UpstreamResponse,
};

/// HTTP client adapter backed by a shared `reqwest` connection pool.
///
/// Responsibilities:
/// * Sends rendered requests upstream with the configured timeout
/// * Reads the whole upstream body before handing the response back
/// * Maps transport failures onto [`HttpClientError`]
///
/// Response bodies are never decompressed, so upstream bytes are relayed unchanged.
pub struct HttpClientAdapter {
    client: Client,
    timeout: Duration,
}

impl HttpClientAdapter {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build upstream HTTP client")?;

        tracing::info!(
            "Created upstream HTTP client with {} timeout",
            humantime::format_duration(timeout)
        );
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error, target: &str) -> HttpClientError {
        if err.is_timeout() {
            HttpClientError::Timeout(self.timeout)
        } else if err.is_builder() {
            HttpClientError::InvalidRequest(format!("{target}: {err}"))
        } else {
            HttpClientError::ConnectionError(format!("Request to {target} failed: {err}"))
        }
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(&self, req: OutboundRequest) -> HttpClientResult<UpstreamResponse> {
        let target = format!("{} {}", req.method, req.url);
        let span = tracing::info_span!(
            "upstream_request",
            upstream.url = %req.url,
            http.method = %req.method,
            http.status_code = tracing::field::Empty,
        );

        async move {
            tracing::debug!("Outgoing request headers: {:?}", req.headers);

            let response = self
                .client
                .request(req.method, req.url)
                .headers(req.headers)
                .body(req.body)
                .send()
                .await
                .map_err(|e| {
                    tracing::Span::current().record("http.status_code", 599u16);
                    let err = self.classify(e, &target);
                    tracing::error!("Upstream request failed: {}", err);
                    err
                })?;

            let status = response.status();
            tracing::Span::current().record("http.status_code", status.as_u16());
            let headers = response.headers().clone();

            let body = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    HttpClientError::Timeout(self.timeout)
                } else {
                    HttpClientError::BodyError(e.to_string())
                }
            })?;

            tracing::info!(
                status = status.as_u16(),
                bytes = body.len(),
                "Upstream responded"
            );
            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        }
        .instrument(span)
        .await
    }
}
