//! Sync and connectivity status, published to any number of observers.
//!
//! Producers (the connectivity monitor, the sync engine and the local store's
//! pending counter) update one shared [`SyncStatus`]. Observers either register
//! a callback with [`StatusBroadcaster::subscribe`] or hold a tokio `watch`
//! receiver from [`StatusBroadcaster::watch`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Whether the remote store is reachable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    #[default]
    Offline,
}

impl Connectivity {
    pub const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Phase of the most recent sync cycle
///
/// `Synced` and `Error` are published as the outcome of a finished cycle and
/// stay visible until the next cycle starts. Neither is terminal: once a cycle
/// ends the engine is idle and accepts new triggers, whatever phase is shown.
/// `Idle` is only published before the first cycle, so watch receivers never
/// miss a cycle's outcome to an immediate `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// No cycle has run yet
    #[default]
    Idle,
    Syncing,
    /// Last cycle finished without failures
    Synced,
    /// Last cycle had failures; the next trigger retries
    Error,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        })
    }
}

/// Snapshot delivered to observers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub connectivity: Connectivity,
    #[serde(rename = "syncPhase")]
    pub phase: SyncPhase,
    /// Entries waiting in the mutation queue
    pub pending_count: usize,
    /// End of the last cycle that finished without failures
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Items that failed during the last cycle
    pub failed_count: usize,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub const fn is_online(&self) -> bool {
        matches!(self.connectivity, Connectivity::Online)
    }
}

type Callback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

struct Inner {
    sender: watch::Sender<SyncStatus>,
    subscribers: Mutex<BTreeMap<u64, Callback>>,
    next_id: AtomicU64,
}

/// Publish/subscribe hub for [`SyncStatus`]
#[derive(Clone)]
pub struct StatusBroadcaster {
    inner: Arc<Inner>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusBroadcaster {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StatusBroadcaster")
            .field("current", &self.current())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncStatus::default());
        Self {
            inner: Arc::new(Inner {
                sender,
                subscribers: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current status snapshot
    pub fn current(&self) -> SyncStatus {
        self.inner.sender.borrow().clone()
    }

    /// Register a callback; it receives the current status immediately and
    /// every later change until the returned [`Subscription`] is dropped.
    ///
    /// Callbacks run on the publishing task and must not block.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(callback);
        self.subscribers().insert(id, callback.clone());

        callback(&self.current());

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Async receiver of status changes
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.inner.sender.subscribe()
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Replace the whole status
    pub(crate) fn publish(&self, status: SyncStatus) {
        self.update(|current| *current = status);
    }

    /// Apply a change; observers are notified only if the status differs.
    pub(crate) fn update(&self, change: impl FnOnce(&mut SyncStatus)) {
        let mut next = self.current();
        change(&mut next);

        let changed = self.inner.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if !changed {
            return;
        }

        let callbacks: Vec<Callback> = self.subscribers().values().cloned().collect();
        for callback in callbacks {
            callback(&next);
        }
    }

    pub(crate) fn set_connectivity(&self, online: bool) {
        self.update(|status| status.connectivity = Connectivity::from_online(online));
    }

    pub(crate) fn set_pending(&self, pending_count: usize) {
        self.update(|status| status.pending_count = pending_count);
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Callback>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`StatusBroadcaster::subscribe`]; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving status changes
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}
