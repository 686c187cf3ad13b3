use std::{future::Future, time::Duration};

use reqwest::StatusCode;

use crate::{config::Config, error::Result, prompt::GenerateRequest};

/// Raw outcome of one POST that reached the server.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// A request that never produced a status code (connect failure, timeout,
/// broken body stream).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends a generation request to the completion endpoint.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = std::result::Result<HttpResponse, TransportError>>
    + Send;
}

/// Waits between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    url: String,
}

impl ReqwestTransport {
    /// Build a transport for the endpoint described by `config`.
    ///
    /// Fails if no API key has been configured.
    pub fn new(config: &Config) -> Result<Self> {
        let url = config.generate_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.attempt_timeout)
            .build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

impl Transport for ReqwestTransport {
    async fn post(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError(describe(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(describe(e)))?;

        Ok(HttpResponse { status, body })
    }
}

// The request URL carries the API key, so it never goes into messages.
fn describe(error: reqwest::Error) -> String {
    let kind = if error.is_timeout() {
        "request timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    format!("{kind}: {}", error.without_url())
}
