//! Background task deciding when sync cycles run.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SyncEngine;

/// Wakes the sync driver after a local write.
///
/// Signals coalesce: any number of writes while a cycle runs schedule one
/// follow-up cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Run a cycle now, then whenever connectivity comes back, a write lands or
/// the trigger fires, until `shutdown` is cancelled.
pub fn spawn_sync_driver(
    engine: SyncEngine,
    trigger: SyncTrigger,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut online = engine.connectivity().subscribe();
        online.borrow_and_update();
        engine.sync_now().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = trigger.notified() => {
                    tracing::debug!("Sync triggered by local write");
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*online.borrow_and_update() {
                        continue;
                    }
                    tracing::debug!("Sync triggered by connectivity change");
                }
            }

            engine.sync_now().await;
        }

        tracing::debug!("Sync driver stopped");
    })
}
