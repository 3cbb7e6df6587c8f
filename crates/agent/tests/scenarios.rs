//! End-to-end lifecycle over a real HTTP server and an on-disk store.

use std::sync::Arc;

use pwa_cache_agent::{CacheAgent, FetchOutcome, WorkerHost, WorkerState};
use pwa_cache_client::{FetchClient, FetchConfig, Network};
use pwa_cache_core::config::AppConfig;
use pwa_cache_core::{CacheDb, CacheStorage, Request, RequestKey};
use url::Url;

fn config_for(origin: &str, db_path: std::path::PathBuf) -> AppConfig {
    AppConfig {
        origin: origin.to_string(),
        precache: vec!["/".into(), "/static/manifest.json".into()],
        db_path,
        ..AppConfig::default()
    }
}

async fn host_for(config: &AppConfig) -> (Arc<WorkerHost>, Arc<CacheDb>) {
    let storage = Arc::new(CacheDb::open(&config.db_path).await.unwrap());
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from_app(config).unwrap()).unwrap());
    let agent = Arc::new(CacheAgent::from_config(config, storage.clone(), Arc::clone(&network)).unwrap());
    (Arc::new(WorkerHost::for_agent(&agent, network)), storage)
}

#[tokio::test]
async fn test_install_activate_and_serve_offline_after_restart() {
    let mut server = mockito::Server::new_async().await;
    let home = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html>")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/static/manifest.json")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let api = server
        .mock("GET", "/api/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"rate":36.5}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server.url(), dir.path().join("cache.sqlite"));

    {
        let (host, storage) = host_for(&config).await;
        storage.open("bcv-converter-cache-v0").await.unwrap();

        let installed = host.install().await.unwrap();
        assert!(installed.skip_waiting);
        assert_eq!(installed.precached, 2);
        assert_eq!(host.state().await, WorkerState::Activated);
        assert!(host.is_controlling());
        assert_eq!(storage.keys().await.unwrap(), vec![config.cache_name.clone()]);

        let outcome = host.fetch(Request::get("/api/data")).await;
        assert_eq!(outcome.source(), "network");
    }

    // A fresh process sees the same store; nothing goes back to the server.
    let (_, storage) = host_for(&config).await;
    let agent = CacheAgent::from_config(
        &config,
        storage.clone(),
        Arc::new(FetchClient::new(FetchConfig::from_app(&config).unwrap()).unwrap()),
    )
    .unwrap();

    for path in ["/", "/api/data"] {
        let outcome = agent.fetch(Request::get(path)).await;
        assert!(matches!(outcome, FetchOutcome::Cache(_)), "{path}");
    }

    let api_url = Url::parse(&server.url()).unwrap().join("/api/data").unwrap();
    let cached = storage
        .match_request(&config.cache_name, &RequestKey::new("GET", &api_url))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.body.as_ref(), br#"{"rate":36.5}"#);

    home.assert_async().await;
    api.assert_async().await;
}

#[tokio::test]
async fn test_failed_precache_leaves_worker_waiting() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/").with_status(200).with_body("<html>").create_async().await;
    server.mock("GET", "/static/manifest.json").with_status(500).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server.url(), dir.path().join("cache.sqlite"));
    let (host, storage) = host_for(&config).await;

    let installed = host.install().await.unwrap();
    assert!(!installed.skip_waiting);
    assert_eq!(host.state().await, WorkerState::Installed);
    assert!(storage.entries(&config.cache_name).await.unwrap().is_empty());

    // Uncontrolled pages go straight to the network.
    let outcome = host.fetch(Request::get("/")).await;
    assert_eq!(outcome.source(), "passthrough");
    assert!(storage.entries(&config.cache_name).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_is_never_cached() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/").with_status(200).create_async().await;
    server.mock("GET", "/static/manifest.json").with_status(200).create_async().await;
    let post = server
        .mock("POST", "/api/data")
        .with_status(200)
        .with_body("posted")
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server.url(), dir.path().join("cache.sqlite"));
    let (host, storage) = host_for(&config).await;
    host.install().await.unwrap();

    for _ in 0..2 {
        let outcome = host.fetch(Request::new("POST", "/api/data")).await;
        assert_eq!(outcome.source(), "passthrough");
    }

    post.assert_async().await;
    assert_eq!(storage.entries(&config.cache_name).await.unwrap().len(), 2);
}
