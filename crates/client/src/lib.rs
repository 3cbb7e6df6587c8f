//! Network side of pwa-cache.
//!
//! This crate provides the [`Network`] seam the agent fetches through, and
//! the reqwest-backed [`FetchClient`] that tags every response with its
//! origin classification.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, classify};
