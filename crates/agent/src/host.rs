//! Worker lifecycle host.
//!
//! Drives an agent through `parsed → installing → installed → activating →
//! activated`, honours skip-waiting and client claiming, and routes page
//! requests: through the agent once it controls pages, straight to the
//! network before that.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pwa_cache_client::Network;
use pwa_cache_core::{Error, Request};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::agent::{ActivateOutcome, CacheAgent, FetchOutcome, InstallOutcome};
use crate::dispatch::{Dispatcher, Outcome, Signal};

/// Lifecycle state of the hosted worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
}

/// Host runtime for one worker.
pub struct WorkerHost {
    dispatcher: Dispatcher,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    controlling: AtomicBool,
}

impl WorkerHost {
    pub fn new(dispatcher: Dispatcher, network: Arc<dyn Network>) -> Self {
        Self { dispatcher, network, state: RwLock::new(WorkerState::Parsed), controlling: AtomicBool::new(false) }
    }

    /// Host `agent`, registering its handlers on a fresh dispatcher.
    pub fn for_agent(agent: &Arc<CacheAgent>, network: Arc<dyn Network>) -> Self {
        let mut dispatcher = Dispatcher::new();
        agent.register(&mut dispatcher);
        Self::new(dispatcher, network)
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether page requests are routed through the agent.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    async fn transition(&self, allowed: &[WorkerState], next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !allowed.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot move from {:?} to {next:?}", *state)));
        }
        *state = next;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Deliver the install signal and wait for it to settle.
    ///
    /// When the agent asks to skip waiting, activation follows immediately.
    /// Otherwise the worker stays `Installed` until [`WorkerHost::activate`].
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        self.transition(&[WorkerState::Parsed, WorkerState::Installed], WorkerState::Installing)
            .await?;

        let outcome = match self.dispatcher.dispatch(Signal::Install).settled().await {
            Ok(Outcome::Installed(outcome)) => outcome,
            Ok(other) => {
                self.set_state(WorkerState::Parsed).await;
                return Err(Error::InvalidInput(format!("install handler resolved with {other:?}")));
            }
            Err(e) => {
                self.set_state(WorkerState::Parsed).await;
                return Err(e);
            }
        };
        self.set_state(WorkerState::Installed).await;

        if outcome.skip_waiting {
            info!(cache = %outcome.cache, "skipping wait, activating immediately");
            if let Err(e) = self.activate().await {
                warn!(error = %e, "activation after install failed");
            }
        } else {
            info!(cache = %outcome.cache, "installed, waiting to activate");
        }

        Ok(outcome)
    }

    /// Deliver the activate signal and wait for it to settle.
    ///
    /// A failed activation leaves the worker `Installed`, so activation can
    /// be retried. It only takes control of pages when the agent claimed them.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)
            .await?;

        let outcome = match self.dispatcher.dispatch(Signal::Activate).settled().await {
            Ok(Outcome::Activated(outcome)) => outcome,
            other => {
                let err = match other {
                    Ok(other) => Error::InvalidInput(format!("activate handler resolved with {other:?}")),
                    Err(e) => e,
                };
                self.set_state(WorkerState::Installed).await;
                error!(error = %err, "activation failed, worker still waiting");
                return Err(err);
            }
        };
        self.set_state(WorkerState::Activated).await;

        if outcome.claimed {
            self.controlling.store(true, Ordering::SeqCst);
            info!("worker activated and controlling pages");
        } else {
            info!("worker activated");
        }

        Ok(outcome)
    }

    /// Route one page request.
    pub async fn fetch(&self, request: Request) -> FetchOutcome {
        if !self.is_controlling() {
            return match self.network.fetch(&request).await {
                Ok(response) => FetchOutcome::Passthrough(response),
                Err(e) => {
                    warn!(url = %request.url, error = %e, "uncontrolled request failed");
                    FetchOutcome::Unavailable
                }
            };
        }

        match self.dispatcher.dispatch(Signal::Fetch(request)).settled().await {
            Ok(Outcome::Fetched(outcome)) => outcome,
            Ok(other) => {
                error!(outcome = ?other, "fetch handler resolved with unexpected outcome");
                FetchOutcome::Unavailable
            }
            Err(e) => {
                error!(error = %e, "fetch handler failed");
                FetchOutcome::Unavailable
            }
        }
    }
}
