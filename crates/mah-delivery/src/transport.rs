use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use mah_config::ExtraMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Default per-request timeout for outbound deliveries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound POST to a single destination.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub destination: String,
    pub headers: ExtraMap,
    pub body: Value,
}

/// Sends outbound requests. Implementations must be safe to call concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &OutboundRequest) -> Result<()>;
}

/// JSON-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<()> {
        let headers = header_map(&request.headers)?;
        let response = self
            .client
            .post(&request.destination)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", request.destination))?;

        let status = response.status();
        if !status.is_success() {
            bail!("POST {} returned {status}", request.destination);
        }
        Ok(())
    }
}

fn header_map(extra: &ExtraMap) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(extra.len());
    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{name}'"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{name}'"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
