//! Scripted network and fixtures shared by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use pwa_cache_client::Network;
use pwa_cache_core::url::resolve;
use pwa_cache_core::{CacheStorage, Error, MemoryStorage, Request, RequestKey, Response, ResponseType};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use url::Url;

pub const ORIGIN: &str = "http://localhost:8080";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn response(url: &str, status: u16, response_type: ResponseType, body: &'static str) -> Response {
    Response {
        url: url.to_string(),
        status,
        status_text: String::new(),
        response_type,
        redirected: false,
        headers: Vec::new(),
        body: Bytes::from_static(body.as_bytes()),
    }
}

enum Route {
    Respond(Response),
    Fail,
}

/// Network fake keyed by (method, absolute URL). Unrouted requests get a
/// basic 404.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<(String, String), Route>>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn absolute(url: &str) -> String {
        resolve(&origin(), url).unwrap().to_string()
    }

    pub fn respond(&self, method: &str, url: &str, mut response: Response) {
        let url = Self::absolute(url);
        response.url = url.clone();
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), url), Route::Respond(response));
    }

    /// Route a basic 200 GET.
    pub fn ok(&self, url: &str, body: &'static str) {
        self.respond("GET", url, response(url, 200, ResponseType::Basic, body));
    }

    pub fn fail(&self, method: &str, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), Self::absolute(url)), Route::Fail);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let url = resolve(&origin(), &request.url)?.to_string();
        let routes = self.routes.lock().unwrap();
        match routes.get(&(request.method.clone(), url.clone())) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail) => Err(Error::Network(format!("{url}: connection refused"))),
            None => Ok(response(&url, 404, ResponseType::Basic, "not found")),
        }
    }
}

/// In-memory storage with injectable faults.
#[derive(Default)]
pub struct FaultyStorage {
    pub inner: MemoryStorage,
    failing_deletes: Mutex<HashMap<String, usize>>,
    failing_lookups: AtomicBool,
    failing_puts: AtomicBool,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self { inner, ..Self::default() }
    }

    /// Fail the next `times` deletions of `name`.
    pub fn fail_delete(&self, name: &str, times: usize) {
        self.failing_deletes.lock().unwrap().insert(name.to_string(), times);
    }

    pub fn fail_lookups(&self) {
        self.failing_lookups.store(true, Ordering::SeqCst);
    }

    /// Fail single-entry writes; `put_all` is unaffected.
    pub fn fail_puts(&self) {
        self.failing_puts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let fail = {
            let mut failing = self.failing_deletes.lock().unwrap();
            match failing.get_mut(name) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(Error::InvalidInput("disk I/O error".into()));
        }
        self.inner.delete(name).await
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        if self.failing_lookups.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry(format!("unreadable entry for {key}")));
        }
        self.inner.match_request(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        if self.failing_puts.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("database or disk is full".into()));
        }
        self.inner.put(name, key, response).await
    }

    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        self.inner.put_all(name, entries).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.entries(name).await
    }
}
