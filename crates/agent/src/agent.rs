//! The caching agent: install, activate and fetch handlers.
//!
//! ### Install
//! - Open (create-if-absent) the current generation's store
//! - Fetch every manifest entry; add them all in one batch or none at all
//! - On success ask the host to skip the waiting phase
//!
//! ### Activate
//! - Delete every store whose name is not the current generation
//! - Claim open pages once cleanup has finished
//!
//! ### Fetch
//! - Non-GET requests pass straight through to the network
//! - GET requests are served cache-first; basic 200 network responses are
//!   copied into the store on the way back

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use pwa_cache_client::Network;
use pwa_cache_core::config::AppConfig;
use pwa_cache_core::url::{parse_origin, resolve};
use pwa_cache_core::{CacheStorage, Error, Request, RequestKey, Response, ResponseType};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

/// Result of the install handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    /// Store that was opened.
    pub cache: String,
    /// Number of manifest entries written; zero when the batch failed.
    pub precached: usize,
    /// Activate immediately instead of waiting for open pages to close.
    pub skip_waiting: bool,
}

/// Result of a successful activate handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    /// Stale stores that were deleted.
    pub deleted: Vec<String>,
    /// Whether the agent took control of open pages.
    pub claimed: bool,
}

/// How an intercepted request was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the current store without touching the network.
    Cache(Response),
    /// Cache miss answered by the network.
    Network(Response),
    /// Not intercepted: forwarded to the network as-is.
    Passthrough(Response),
    /// Neither the store nor the network produced a response.
    Unavailable,
}

impl FetchOutcome {
    /// The response handed back to the page, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::Passthrough(r) => Some(r),
            FetchOutcome::Unavailable => None,
        }
    }

    /// Short label for where the answer came from.
    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::Cache(_) => "cache",
            FetchOutcome::Network(_) => "network",
            FetchOutcome::Passthrough(_) => "passthrough",
            FetchOutcome::Unavailable => "unavailable",
        }
    }
}

/// Offline-caching agent for one cache generation.
///
/// Holds no state of its own between signals; everything durable lives in
/// the injected [`CacheStorage`].
pub struct CacheAgent {
    cache_name: String,
    origin: Url,
    manifest: Vec<String>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl CacheAgent {
    pub fn new(
        cache_name: impl Into<String>, origin: Url, manifest: Vec<String>, storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self { cache_name: cache_name.into(), origin, manifest, storage, network }
    }

    /// Build an agent for the configured generation and manifest.
    pub fn from_config(
        config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin)?;
        Ok(Self::new(config.cache_name.clone(), origin, config.precache.clone(), storage, network))
    }

    /// Current generation identifier.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Precache manifest entries, as configured.
    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Install handler.
    ///
    /// Precache failures are logged and swallowed: installation completes
    /// either way, but only a complete batch asks to skip waiting.
    pub async fn install(&self) -> InstallOutcome {
        info!(cache = %self.cache_name, entries = self.manifest.len(), "opening cache and precaching resources");

        match self.precache().await {
            Ok(precached) => {
                info!(cache = %self.cache_name, precached, "precache complete");
                InstallOutcome { cache: self.cache_name.clone(), precached, skip_waiting: true }
            }
            Err(e) => {
                error!(cache = %self.cache_name, error = %e, "precaching resources failed");
                InstallOutcome { cache: self.cache_name.clone(), precached: 0, skip_waiting: false }
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        self.storage.open(&self.cache_name).await?;

        let urls = self
            .manifest
            .iter()
            .map(|entry| resolve(&self.origin, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = urls.iter().map(|url| async move {
            let response = self
                .network
                .fetch(&Request::get(url.as_str()))
                .await
                .map_err(|e| Error::PrecacheFailed(e.to_string()))?;
            if !response.ok() {
                return Err(Error::PrecacheFailed(format!("{url} responded with status {}", response.status)));
            }
            if matches!(
                response.response_type,
                ResponseType::Opaque | ResponseType::OpaqueRedirect | ResponseType::Error
            ) {
                return Err(Error::PrecacheFailed(format!(
                    "{url} returned an unverifiable {} response",
                    response.response_type
                )));
            }
            Ok((RequestKey::new("GET", url), response))
        });

        let entries = try_join_all(fetches).await?;
        self.storage.put_all(&self.cache_name, &entries).await?;

        Ok(entries.len())
    }

    /// Activate handler.
    ///
    /// Every stale store deletion is attempted even if a sibling fails. Any
    /// failure fails the activation and clients are not claimed.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.cache_name)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            info!(cache = %name, "deleting stale cache");
            (name, self.storage.delete(name).await)
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in results {
            match result {
                Ok(_) => deleted.push(name.clone()),
                Err(e) => {
                    error!(cache = %name, error = %e, "failed to delete stale cache");
                    failed.push(format!("{name}: {e}"));
                }
            }
        }

        if !failed.is_empty() {
            return Err(Error::StaleDeletion(failed.join("; ")));
        }

        info!(cache = %self.cache_name, deleted = deleted.len(), "activated, claiming clients");
        Ok(ActivateOutcome { deleted, claimed: true })
    }

    /// Fetch interceptor.
    pub async fn fetch(&self, request: Request) -> FetchOutcome {
        if !request.is_get() {
            return match self.network.fetch(&request).await {
                Ok(response) => FetchOutcome::Passthrough(response),
                Err(e) => {
                    warn!(method = %request.method, url = %request.url, error = %e, "passthrough request failed");
                    FetchOutcome::Unavailable
                }
            };
        }

        let url = match resolve(&self.origin, &request.url) {
            Ok(url) => url,
            Err(e) => {
                error!(url = %request.url, error = %e, "cannot resolve request url");
                return FetchOutcome::Unavailable;
            }
        };
        let key = RequestKey::new(&request.method, &url);

        match self.storage.match_request(&self.cache_name, &key).await {
            Ok(Some(cached)) => {
                debug!(url = %url, "serving from cache");
                return FetchOutcome::Cache(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(url = %url, error = %e, "cache lookup failed, treating as miss"),
        }

        debug!(url = %url, "serving from network");
        let request = Request { url: url.to_string(), ..request };
        let response = match self.network.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(url = %url, error = %e, "network request failed");
                return FetchOutcome::Unavailable;
            }
        };

        if response.is_cacheable() {
            if let Err(e) = self.store(&key, &response).await {
                warn!(url = %url, error = %e, "failed to cache network response");
            }
        } else {
            debug!(
                url = %url,
                status = response.status,
                response_type = %response.response_type,
                redirected = response.redirected,
                "response not cacheable"
            );
        }

        FetchOutcome::Network(response)
    }

    /// Persist a copy of `response`; the caller keeps the original.
    async fn store(&self, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.storage.open(&self.cache_name).await?;
        self.storage.put(&self.cache_name, key, response).await
    }
}
