//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PWA_CACHE_*)
//! 2. TOML config file (if PWA_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PWA_CACHE_*)
/// 2. TOML config file (if PWA_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation identifier: the name of the authoritative cache store.
    ///
    /// Bump it whenever `precache` changes; activation deletes every other store.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Application origin that relative locators resolve against.
    ///
    /// Responses from this origin are classified as basic.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Precache manifest, added to the store at install time.
    ///
    /// Set via PWA_CACHE_PRECACHE as `[a, b]` or in the TOML file.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout handed to the HTTP stack, in milliseconds.
    ///
    /// The agent imposes no timeout of its own.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum number of redirects the HTTP stack follows.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Dispatch the install signal as soon as the host starts.
    #[serde(default = "default_true")]
    pub auto_install: bool,
}

fn default_cache_name() -> String {
    "bcv-converter-cache-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/static/manifest.json",
        "/static/sw.js",
        "/static/icons/icon-192x192.png",
        "/static/icons/icon-512x512.png",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.0/css/all.min.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pwa-cache.sqlite")
}

fn default_user_agent() -> String {
    "pwa-cache/0.1".into()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            origin: default_origin(),
            precache: default_precache(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_redirects: default_max_redirects(),
            auto_install: true,
        }
    }
}

impl AppConfig {
    /// Connect timeout as Duration for use with reqwest.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PWA_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("PWA_CACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into()),
        )
    }

    /// Extract and validate a configuration from an explicit provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
