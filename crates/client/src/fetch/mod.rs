//! HTTP fetch pipeline for intercepted requests.
//!
//! ### Request Resolution
//! - Relative URLs resolve against the application origin
//! - Method, headers and body are forwarded unmodified
//!
//! ### Response Handling
//! - Non-2xx statuses are responses, not errors
//! - Redirects are followed up to the configured limit and flagged
//! - Every response is tagged basic / cors / opaque (see [`classify`])
//!
//! ### Failures
//! - Connection, DNS and TLS failures surface as `Error::Network`
//! - No retries and no timeout beyond the connect timeout

pub mod classify;

use async_trait::async_trait;
use pwa_cache_core::config::AppConfig;
use pwa_cache_core::url::{parse_origin, resolve};
use pwa_cache_core::{Error, Request, Response};
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use url::Url;

pub use classify::classify;

/// Network seam: given a request, produce a response or fail.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Application origin for URL resolution and classification
    pub origin: Url,

    /// User agent string (default: "pwa-cache/0.1")
    pub user_agent: String,

    /// TCP connect timeout (default: 10s)
    pub connect_timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Build from the application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            origin: parse_origin(&config.origin)?,
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            max_redirects: config.max_redirects,
        })
    }
}

/// reqwest-backed network client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = resolve(&self.config.origin, &request.url)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let final_url = response.url().clone();
        let redirected = final_url != url;
        let response_type = classify(&self.config.origin, &final_url, response.headers());

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect::<Vec<_>>();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        tracing::debug!(
            url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            response_type = %response_type,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(Response {
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type,
            redirected,
            headers,
            body,
        })
    }
}
