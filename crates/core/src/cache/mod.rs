//! Named cache stores.
//!
//! A cache store is a persistent map from request identity to response,
//! addressed by name. The agent only ever talks to [`CacheStorage`]; two
//! backends are provided:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, survives process restarts
//! - [`MemoryStorage`]: process-local, for tests and ephemeral hosts
//!
//! Entry writes are independent upserts (last writer wins). `put_all` is the
//! only multi-entry operation and is all-or-nothing.

pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;

use crate::message::{RequestKey, Response};

/// Host cache store API.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Whether a store with this name exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stores, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store had that name.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up a stored response. A missing store is a miss, not an error.
    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Store one response under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// `Error::StoreNotFound` if the store was never opened.
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Store a batch of responses atomically: either every entry is written
    /// or none is.
    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error>;

    /// Request keys held by a store, in insertion order.
    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error>;
}
