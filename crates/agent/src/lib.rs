//! Offline-caching agent and the host runtime that drives it.
//!
//! The [`CacheAgent`] reacts to three lifecycle signals (install, activate,
//! fetch). A [`WorkerHost`] owns the handler table, tracks the lifecycle
//! state, and decides whether a request is routed through the agent.

pub mod agent;
pub mod dispatch;
pub mod host;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{ActivateOutcome, CacheAgent, FetchOutcome, InstallOutcome};
pub use dispatch::{Completion, Dispatcher, Outcome, Signal, SignalKind};
pub use host::{WorkerHost, WorkerState};
