//! Connectivity monitor: the single source of truth for "can we reach the
//! remote store right now".
//!
//! The state combines the platform's coarse network-presence signal with an
//! active [`ReachabilityProbe`]. Coarse offline always means offline; coarse
//! online is confirmed (or overruled) by the probe, and only trusted on its
//! own when probing is impossible.

mod probe;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use probe::{
    HttpReachabilityProbe, NoRemoteEndpoint, ProbeOutcome, ReachabilityProbe,
    DEFAULT_PROBE_TIMEOUT, HEALTH_CHECK_PATH,
};

use crate::status::StatusBroadcaster;

/// Default interval between background re-probes
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

struct MonitorInner {
    probe: Arc<dyn ReachabilityProbe>,
    presence: watch::Sender<bool>,
    online: watch::Sender<bool>,
    status: StatusBroadcaster,
    probe_interval: Duration,
    evaluating: Mutex<()>,
}

/// Tracks online/offline transitions
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("network_presence", &self.network_presence())
            .field("probe_interval", &self.inner.probe_interval)
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor that starts offline until the first evaluation.
    ///
    /// Network presence is assumed until the platform reports otherwise.
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        status: StatusBroadcaster,
        probe_interval: Duration,
    ) -> Self {
        let (presence, _) = watch::channel(true);
        let (online, _) = watch::channel(false);
        status.set_connectivity(false);

        Self {
            inner: Arc::new(MonitorInner {
                probe,
                presence,
                online,
                status,
                probe_interval,
                evaluating: Mutex::new(()),
            }),
        }
    }

    /// Current connectivity state
    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    /// Receiver notified exactly when the state flips
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    /// Last coarse network-presence signal
    pub fn network_presence(&self) -> bool {
        *self.inner.presence.borrow()
    }

    /// Record the platform's coarse online/offline signal.
    ///
    /// A running [`ConnectivityMonitor::run`] loop re-evaluates immediately.
    /// Returns whether the signal changed.
    pub fn set_network_presence(&self, present: bool) -> bool {
        self.inner.presence.send_if_modified(|current| {
            if *current == present {
                false
            } else {
                *current = present;
                true
            }
        })
    }

    /// Evaluate both signals now and return the resulting state.
    pub async fn refresh(&self) -> bool {
        let _evaluating = self.inner.evaluating.lock().await;

        let online = if self.network_presence() {
            match self.inner.probe.probe().await {
                ProbeOutcome::Reachable => true,
                ProbeOutcome::Unreachable => false,
                ProbeOutcome::Unavailable => self.network_presence(),
            }
        } else {
            false
        };

        self.apply(online);
        online
    }

    fn apply(&self, online: bool) {
        let flipped = self.inner.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if flipped {
            if online {
                tracing::info!("Remote store reachable; now online");
            } else {
                tracing::info!("Remote store unreachable; now offline");
            }
            self.inner.status.set_connectivity(online);
        }
    }

    /// Re-probe on a fixed interval and on every coarse signal change until
    /// `shutdown` is cancelled. The first evaluation happens immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut presence = self.inner.presence.subscribe();
        let mut ticker = tokio::time::interval(self.inner.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                changed = presence.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    presence.borrow_and_update();
                    ticker.reset();
                }
            }

            self.refresh().await;
        }

        tracing::debug!("Connectivity monitor stopped");
    }
}
