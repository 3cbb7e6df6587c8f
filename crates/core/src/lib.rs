//! Core types and shared functionality for pwa-cache.
//!
//! This crate provides:
//! - Request/response model and request identity keys
//! - Named cache stores with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod url;

pub use cache::{CacheDb, CacheStorage, MemoryStorage};
pub use error::Error;
pub use message::{Request, RequestKey, Response, ResponseType};
