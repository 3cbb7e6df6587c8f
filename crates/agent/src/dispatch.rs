//! Signal dispatch with deferred completion.
//!
//! Handlers are registered per [`SignalKind`]. Dispatching a signal spawns
//! the handler on its own task and hands back a [`Completion`]; the signal
//! is only considered handled once that completion settles.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use pwa_cache_core::{Error, Request};
use tokio::task::JoinHandle;

use crate::agent::{ActivateOutcome, CacheAgent, FetchOutcome, InstallOutcome};

/// Lifecycle signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalKind::Install => "install",
            SignalKind::Activate => "activate",
            SignalKind::Fetch => "fetch",
        })
    }
}

/// A signal delivered by the host.
#[derive(Debug, Clone)]
pub enum Signal {
    Install,
    Activate,
    Fetch(Request),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Install => SignalKind::Install,
            Signal::Activate => SignalKind::Activate,
            Signal::Fetch(_) => SignalKind::Fetch,
        }
    }
}

/// What a handler resolved with.
#[derive(Debug, Clone)]
pub enum Outcome {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    Fetched(FetchOutcome),
}

type Handler = Arc<dyn Fn(Signal) -> BoxFuture<'static, Result<Outcome, Error>> + Send + Sync>;

/// Handler registration table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<SignalKind, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn on<F, Fut>(&mut self, kind: SignalKind, handler: F)
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, Error>> + Send + 'static,
    {
        self.handlers.insert(kind, Arc::new(move |signal| handler(signal).boxed()));
    }

    pub fn handles(&self, kind: SignalKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for `signal` on a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, signal: Signal) -> Completion {
        let kind = signal.kind();
        let task = match self.handlers.get(&kind) {
            Some(handler) => tokio::spawn(handler(signal)),
            None => tokio::spawn(async move { Err(Error::NoHandler(kind.to_string())) }),
        };
        Completion { kind, task }
    }
}

/// Deferred completion token for one dispatched signal.
pub struct Completion {
    kind: SignalKind,
    task: JoinHandle<Result<Outcome, Error>>,
}

impl Completion {
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Wait for the handler's work to finish.
    pub async fn settled(self) -> Result<Outcome, Error> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::TaskFailed(format!("{} handler: {e}", self.kind))),
        }
    }
}

impl CacheAgent {
    /// Register this agent's install, activate and fetch handlers.
    pub fn register(self: &Arc<Self>, dispatcher: &mut Dispatcher) {
        let agent = Arc::clone(self);
        dispatcher.on(SignalKind::Install, move |_| {
            let agent = Arc::clone(&agent);
            async move { Ok(Outcome::Installed(agent.install().await)) }
        });

        let agent = Arc::clone(self);
        dispatcher.on(SignalKind::Activate, move |_| {
            let agent = Arc::clone(&agent);
            async move { agent.activate().await.map(Outcome::Activated) }
        });

        let agent = Arc::clone(self);
        dispatcher.on(SignalKind::Fetch, move |signal| {
            let agent = Arc::clone(&agent);
            async move {
                match signal {
                    Signal::Fetch(request) => Ok(Outcome::Fetched(agent.fetch(request).await)),
                    other => Err(Error::InvalidInput(format!("fetch handler received {} signal", other.kind()))),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, origin};
    use pwa_cache_core::MemoryStorage;

    #[tokio::test]
    async fn test_dispatch_without_handler() {
        let dispatcher = Dispatcher::new();
        let result = dispatcher.dispatch(Signal::Install).settled().await;
        assert!(matches!(result, Err(Error::NoHandler(kind)) if kind == "install"));
    }

    #[tokio::test]
    async fn test_completion_waits_for_handler() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));

        let mut dispatcher = Dispatcher::new();
        dispatcher.on(SignalKind::Activate, move |_| {
            let rx = Arc::clone(&rx);
            async move {
                if let Some(rx) = rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok(Outcome::Activated(ActivateOutcome { deleted: Vec::new(), claimed: true }))
            }
        });

        let completion = dispatcher.dispatch(Signal::Activate);
        assert_eq!(completion.kind(), SignalKind::Activate);
        tx.send(()).unwrap();

        let outcome = completion.settled().await.unwrap();
        assert!(matches!(outcome, Outcome::Activated(ActivateOutcome { claimed: true, .. })));
    }

    async fn exploding(_: Signal) -> Result<Outcome, Error> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_handler_is_task_failure() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on(SignalKind::Install, exploding);

        let result = dispatcher.dispatch(Signal::Install).settled().await;
        assert!(matches!(result, Err(Error::TaskFailed(_))));
    }

    #[tokio::test]
    async fn test_agent_registers_all_signals() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::new());
        network.ok("/", "<html>");
        let agent = Arc::new(CacheAgent::new("v1", origin(), vec!["/".into()], storage, network));

        let mut dispatcher = Dispatcher::new();
        agent.register(&mut dispatcher);
        for kind in [SignalKind::Install, SignalKind::Activate, SignalKind::Fetch] {
            assert!(dispatcher.handles(kind));
        }

        let installed = dispatcher.dispatch(Signal::Install).settled().await.unwrap();
        assert!(matches!(installed, Outcome::Installed(InstallOutcome { skip_waiting: true, .. })));

        let fetched = dispatcher
            .dispatch(Signal::Fetch(Request::get("/")))
            .settled()
            .await
            .unwrap();
        assert!(matches!(fetched, Outcome::Fetched(FetchOutcome::Cache(_))));
    }
}
