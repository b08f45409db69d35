//! Scripted collaborators for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::connectivity::{ConnectivityMonitor, ProbeOutcome, ReachabilityProbe};
use crate::models::EntityId;
use crate::sync::{RemoteError, RemoteStore, RemoteWrite};

/// Probe returning whatever outcome the test last set.
#[derive(Clone)]
pub struct ScriptedProbe {
    outcome: Arc<Mutex<ProbeOutcome>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            outcome: Arc::new(Mutex::new(outcome)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, outcome: ProbeOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.outcome.lock().unwrap()
    }
}

#[derive(Default)]
struct RemoteState {
    writes: Mutex<Vec<RemoteWrite>>,
    failing: Mutex<HashSet<EntityId>>,
    no_credentials: AtomicBool,
    holding: AtomicBool,
    entered: Notify,
    release: Notify,
    disconnect: Mutex<Option<(usize, ConnectivityMonitor)>>,
}

/// In-memory remote store recording every successful write.
#[derive(Clone, Default)]
pub struct ScriptedRemote {
    state: Arc<RemoteState>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_credentials() -> Self {
        let remote = Self::default();
        remote.state.no_credentials.store(true, Ordering::SeqCst);
        remote
    }

    /// Reject every write for `id` until [`ScriptedRemote::recover`].
    pub fn fail(&self, id: &EntityId) {
        self.state.failing.lock().unwrap().insert(id.clone());
    }

    pub fn recover(&self, id: &EntityId) {
        self.state.failing.lock().unwrap().remove(id);
    }

    /// Successful writes in the order they were applied
    pub fn writes(&self) -> Vec<RemoteWrite> {
        self.state.writes.lock().unwrap().clone()
    }

    pub fn written_ids(&self) -> Vec<EntityId> {
        self.writes().into_iter().map(|write| write.id).collect()
    }

    /// Park every write until [`ScriptedRemote::release`] is called.
    pub fn hold(&self) {
        self.state.holding.store(true, Ordering::SeqCst);
    }

    /// Wait until a held write has started
    pub async fn entered(&self) {
        self.state.entered.notified().await;
    }

    pub fn release(&self) {
        self.state.holding.store(false, Ordering::SeqCst);
        self.state.release.notify_waiters();
    }

    /// Take `monitor` offline once `writes` writes have succeeded.
    pub fn disconnect_after(&self, writes: usize, monitor: ConnectivityMonitor) {
        *self.state.disconnect.lock().unwrap() = Some((writes, monitor));
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    fn has_credentials(&self) -> bool {
        !self.state.no_credentials.load(Ordering::SeqCst)
    }

    async fn apply(&self, write: &RemoteWrite) -> Result<(), RemoteError> {
        if self.state.holding.load(Ordering::SeqCst) {
            let released = self.state.release.notified();
            self.state.entered.notify_one();
            released.await;
        }

        if self.state.failing.lock().unwrap().contains(&write.id) {
            return Err(RemoteError::Rejected {
                status: 500,
                message: format!("scripted failure for {}", write.id),
            });
        }

        let count = {
            let mut writes = self.state.writes.lock().unwrap();
            writes.push(write.clone());
            writes.len()
        };

        let monitor = {
            let disconnect = self.state.disconnect.lock().unwrap();
            disconnect
                .as_ref()
                .filter(|(after, _)| *after == count)
                .map(|(_, monitor)| monitor.clone())
        };
        if let Some(monitor) = monitor {
            monitor.set_network_presence(false);
            monitor.refresh().await;
        }

        Ok(())
    }
}
