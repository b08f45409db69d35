//! Sync engine: drains the mutation queue into the remote store.
//!
//! A cycle walks the queue in enqueue order, pushing each entry's current
//! local record (or a delete) and acknowledging it only on remote success.
//! A reconciliation pass then pushes dirty records that no queue entry
//! covers, so dirty flags remain the ground truth even if the queue was
//! reset. Failures are contained: they leave entries queued and surface only
//! through the status broadcaster.

mod driver;
mod remote;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

pub use driver::{spawn_sync_driver, SyncTrigger};
pub use remote::{
    DisabledRemote, HttpRemoteStore, RemoteError, RemoteStore, RemoteWrite, RECORDS_PATH,
};

use crate::connectivity::ConnectivityMonitor;
use crate::db::RawRecord;
use crate::error::Result;
use crate::models::{EntityId, EntityKind};
use crate::queue::{Operation, QueueEntry};
use crate::services::LocalStore;
use crate::status::{StatusBroadcaster, SyncPhase};
use crate::util::now_micros;

/// Default bound on a single remote write
pub const DEFAULT_SYNC_ITEM_TIMEOUT: Duration = Duration::from_secs(20);

const CONNECTIVITY_LOST: &str = "connectivity lost during sync";

/// Why a cycle did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Effectively offline; the queue was left untouched
    Offline,
    /// Another cycle holds the guard
    InProgress,
    /// The remote store has no credentials
    NoCredentials,
}

/// Counters for one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote writes that succeeded
    pub pushed: usize,
    /// Create/update entries whose record no longer exists locally
    pub dropped: usize,
    /// Entries acknowledged without a second write for the same version
    pub coalesced: usize,
    /// Dirty records pushed by the reconciliation pass
    pub reconciled: usize,
    /// Remote writes that failed
    pub failed: usize,
    /// Entries skipped because an earlier entry for the entity failed
    pub deferred: usize,
    /// The cycle stopped early because connectivity was lost
    pub aborted_offline: bool,
    pub last_error: Option<String>,
}

impl SyncReport {
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && !self.aborted_offline && self.last_error.is_none()
    }

    fn record_failure(&mut self, message: String) {
        self.failed += 1;
        self.last_error = Some(message);
    }
}

/// Result of [`SyncEngine::sync_now`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

type EntityKey = (EntityKind, EntityId);

struct EngineInner {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivityMonitor,
    status: StatusBroadcaster,
    guard: Mutex<()>,
    item_timeout: Duration,
}

/// Pushes local changes to the remote store
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncEngine")
            .field("store", &self.inner.store)
            .field("connectivity", &self.inner.connectivity)
            .field("item_timeout", &self.inner.item_timeout)
            .finish_non_exhaustive()
    }
}

/// Per-cycle bookkeeping
#[derive(Default)]
struct CycleState {
    report: SyncReport,
    failed: HashSet<EntityKey>,
    pushed_versions: HashMap<EntityKey, DateTime<Utc>>,
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        status: StatusBroadcaster,
        item_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                remote,
                connectivity,
                status,
                guard: Mutex::new(()),
                item_timeout,
            }),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    /// Whether a cycle currently holds the guard
    pub fn is_syncing(&self) -> bool {
        self.inner.guard.try_lock().is_err()
    }

    /// Run one sync cycle now.
    ///
    /// Never fails: skipped cycles are reported as [`SyncOutcome::Skipped`]
    /// and push failures are recorded in the report and the status.
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.inner.connectivity.is_online() {
            tracing::debug!("Sync skipped: network unavailable");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        let Ok(_guard) = self.inner.guard.try_lock() else {
            tracing::debug!("Sync skipped: cycle already running");
            return SyncOutcome::Skipped(SkipReason::InProgress);
        };

        if !self.inner.remote.has_credentials() {
            tracing::debug!("Sync skipped: no remote credentials");
            return SyncOutcome::Skipped(SkipReason::NoCredentials);
        }

        self.inner.status.update(|status| status.phase = SyncPhase::Syncing);

        let mut cycle = CycleState::default();
        if let Err(error) = self.run_cycle(&mut cycle).await {
            tracing::warn!("Sync cycle failed: {error}");
            cycle.report.last_error = Some(error.to_string());
        }
        let report = cycle.report;

        self.publish_result(&report).await;
        tracing::info!(
            pushed = report.pushed,
            reconciled = report.reconciled,
            dropped = report.dropped,
            coalesced = report.coalesced,
            failed = report.failed,
            deferred = report.deferred,
            aborted_offline = report.aborted_offline,
            "Sync cycle finished"
        );

        SyncOutcome::Completed(report)
    }

    async fn run_cycle(&self, cycle: &mut CycleState) -> Result<()> {
        let entries = self.inner.store.pending_mutations().await?;
        tracing::debug!(entries = entries.len(), "Draining mutation queue");

        for entry in entries {
            if !self.inner.connectivity.is_online() {
                cycle.report.aborted_offline = true;
                cycle.report.last_error = Some(CONNECTIVITY_LOST.to_string());
                return Ok(());
            }
            self.process_entry(entry, cycle).await?;
        }

        self.reconcile(cycle).await
    }

    async fn process_entry(&self, entry: QueueEntry, cycle: &mut CycleState) -> Result<()> {
        let key = entry.key();
        if cycle.failed.contains(&key) {
            cycle.report.deferred += 1;
            return Ok(());
        }

        if entry.operation == Operation::Delete {
            let write = RemoteWrite::delete(entry.kind, entry.entity_id.clone());
            match self.push(&write).await {
                Ok(()) => {
                    self.inner.store.acknowledge(entry.seq).await?;
                    cycle.pushed_versions.remove(&key);
                    cycle.report.pushed += 1;
                }
                Err(error) => Self::fail(cycle, key, &error),
            }
            return Ok(());
        }

        let Some(record) = self
            .inner
            .store
            .raw_record(entry.kind, &entry.entity_id)
            .await?
        else {
            tracing::debug!(kind = %entry.kind, id = %entry.entity_id, "Dropping entry for missing record");
            self.inner.store.acknowledge(entry.seq).await?;
            cycle.report.dropped += 1;
            return Ok(());
        };

        if cycle.pushed_versions.get(&key) == Some(&record.updated_at) {
            self.inner.store.acknowledge(entry.seq).await?;
            cycle.report.coalesced += 1;
            return Ok(());
        }

        match self.push_record(entry.operation, record).await {
            Ok(version) => {
                self.inner.store.acknowledge(entry.seq).await?;
                cycle.pushed_versions.insert(key, version);
                cycle.report.pushed += 1;
            }
            Err(error) => Self::fail(cycle, key, &error),
        }
        Ok(())
    }

    /// Push dirty records that no remaining queue entry covers.
    async fn reconcile(&self, cycle: &mut CycleState) -> Result<()> {
        let queued: HashSet<EntityKey> = self
            .inner
            .store
            .pending_mutations()
            .await?
            .iter()
            .map(QueueEntry::key)
            .collect();

        for kind in EntityKind::ALL {
            for record in self.inner.store.dirty_records(kind).await? {
                let key = (kind, record.id.clone());
                if queued.contains(&key) || cycle.failed.contains(&key) {
                    continue;
                }
                if !self.inner.connectivity.is_online() {
                    cycle.report.aborted_offline = true;
                    cycle.report.last_error = Some(CONNECTIVITY_LOST.to_string());
                    return Ok(());
                }

                if cycle.pushed_versions.get(&key) == Some(&record.updated_at) {
                    self.inner
                        .store
                        .mark_clean(kind, &record.id, &record.updated_at)
                        .await?;
                    continue;
                }

                tracing::debug!(%kind, id = %record.id, "Reconciling unqueued dirty record");
                match self.push_record(Operation::Update, record).await {
                    Ok(version) => {
                        cycle.pushed_versions.insert(key, version);
                        cycle.report.reconciled += 1;
                    }
                    Err(error) => Self::fail(cycle, key, &error),
                }
            }
        }
        Ok(())
    }

    /// Upsert a record remotely and clear its dirty flag if unchanged since.
    async fn push_record(
        &self,
        operation: Operation,
        record: RawRecord,
    ) -> std::result::Result<DateTime<Utc>, RemoteError> {
        let RawRecord {
            kind,
            id,
            payload,
            updated_at,
            ..
        } = record;
        let write = RemoteWrite::upsert(operation, kind, id, payload);
        self.push(&write).await?;

        match self
            .inner
            .store
            .mark_clean(kind, &write.id, &updated_at)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%kind, id = %write.id, "Record changed during push; stays dirty");
            }
            Err(error) => {
                tracing::warn!(%kind, id = %write.id, "Failed to clear dirty flag: {error}");
            }
        }
        Ok(updated_at)
    }

    async fn push(&self, write: &RemoteWrite) -> std::result::Result<(), RemoteError> {
        let timeout = self.inner.item_timeout;
        let result = tokio::time::timeout(timeout, self.inner.remote.apply(write))
            .await
            .unwrap_or(Err(RemoteError::Timeout(timeout)));

        if result.is_ok() {
            tracing::debug!(
                operation = %write.operation,
                kind = %write.kind,
                id = %write.id,
                "Pushed remote write"
            );
        }
        result
    }

    fn fail(cycle: &mut CycleState, key: EntityKey, error: &RemoteError) {
        tracing::warn!(kind = %key.0, id = %key.1, "Remote write failed: {error}");
        cycle.report.record_failure(error.to_string());
        cycle.failed.insert(key);
    }

    async fn publish_result(&self, report: &SyncReport) {
        let pending = match self.inner.store.pending_count().await {
            Ok(pending) => Some(pending),
            Err(error) => {
                tracing::warn!("Failed to read queue size after sync: {error}");
                None
            }
        };

        let clean = report.is_clean();
        self.inner.status.update(|status| {
            if let Some(pending) = pending {
                status.pending_count = pending;
            }
            status.failed_count = report.failed;
            status.last_error.clone_from(&report.last_error);
            if clean {
                status.phase = SyncPhase::Synced;
                status.last_sync_at = Some(now_micros());
            } else {
                status.phase = SyncPhase::Error;
            }
        });
    }
}
