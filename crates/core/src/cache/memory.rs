//! In-process [`CacheStorage`] backend.
//!
//! Uses a `Vec` of named stores behind a tokio RwLock so creation and
//! insertion order match the SQLite backend. Stores are expected to hold a
//! handful of entries, so lookups are linear.

use super::CacheStorage;
use crate::Error;
use crate::message::{RequestKey, Response};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Store {
    name: String,
    entries: Vec<(RequestKey, Response)>,
}

impl Store {
    fn upsert(&mut self, key: RequestKey, response: Response) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = response,
            None => self.entries.push((key, response)),
        }
    }
}

/// Memory-only cache storage. Clones share the same stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<Store>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        if !stores.iter().any(|s| s.name == name) {
            stores.push(Store { name: name.to_string(), entries: Vec::new() });
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.iter().any(|s| s.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|s| s.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.entries.iter().find(|(k, _)| k == key))
            .map(|(_, r)| r.clone()))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let store = stores
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
        store.upsert(key.clone(), response.clone());
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let store = stores
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
        for (key, response) in entries {
            store.upsert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let stores = self.stores.read().await;
        let store = stores
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))?;
        Ok(store.entries.iter().map(|(k, _)| k.clone()).collect())
    }
}
