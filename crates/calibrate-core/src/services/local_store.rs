//! Durable local store: entity tables plus the mutation queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use tokio::sync::{Mutex, OnceCell};

use crate::db::{Database, RawRecord, RecordRepository};
use crate::error::{Error, Result};
use crate::models::{EntityData, EntityId, EntityKind, Record};
use crate::queue::{MutationQueue, Operation, QueueEntry};
use crate::status::StatusBroadcaster;
use crate::sync::SyncTrigger;
use crate::util::{next_version, now_micros};

/// Where the store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Path(PathBuf),
    InMemory,
}

/// Durability actually achieved by [`LocalStore::init_or_degrade`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Durable,
    MemoryOnly,
}

/// Behavior of `update` when the id is not stored locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// Store the record as new
    #[default]
    Upsert,
    /// Fail with [`Error::NotFound`]
    Strict,
}

/// Update mode per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateModes {
    pub customer: UpdateMode,
    pub equipment: UpdateMode,
    pub tool: UpdateMode,
    pub calibration: UpdateMode,
}

impl UpdateModes {
    /// The same mode for every kind
    pub const fn all(mode: UpdateMode) -> Self {
        Self {
            customer: mode,
            equipment: mode,
            tool: mode,
            calibration: mode,
        }
    }

    pub const fn for_kind(&self, kind: EntityKind) -> UpdateMode {
        match kind {
            EntityKind::Customer => self.customer,
            EntityKind::Equipment => self.equipment,
            EntityKind::Tool => self.tool,
            EntityKind::Calibration => self.calibration,
        }
    }
}

struct StoreInner {
    location: StorageLocation,
    db: OnceCell<Arc<Mutex<Database>>>,
    open_attempts: AtomicUsize,
    update_modes: UpdateModes,
    status: StatusBroadcaster,
    trigger: SyncTrigger,
}

/// Thread-safe handle to the local store.
///
/// Every mutating call runs in one `SQLite` transaction that also appends the
/// matching mutation-queue entry, then signals the sync trigger.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LocalStore")
            .field("location", &self.inner.location)
            .field("initialized", &self.inner.db.initialized())
            .field("update_modes", &self.inner.update_modes)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Create a store handle; storage is opened lazily by [`LocalStore::init`].
    pub fn new(
        location: StorageLocation,
        update_modes: UpdateModes,
        status: StatusBroadcaster,
        trigger: SyncTrigger,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                location,
                db: OnceCell::new(),
                open_attempts: AtomicUsize::new(0),
                update_modes,
                status,
                trigger,
            }),
        }
    }

    /// Open storage and apply the schema.
    ///
    /// Idempotent: concurrent callers share the same in-flight initialization.
    /// A failed attempt leaves the store uninitialized so a later call retries.
    pub async fn init(&self) -> Result<()> {
        self.database().await.map(|_| ())
    }

    /// Like [`LocalStore::init`], but falls back to an in-memory database
    /// when durable storage is unavailable.
    pub async fn init_or_degrade(&self) -> Result<StorageMode> {
        match self.init().await {
            Ok(()) => self.storage_mode().await,
            Err(Error::StorageUnavailable(reason)) => {
                tracing::warn!("Durable storage unavailable ({reason}); continuing memory-only");
                let database = Database::open_in_memory()?;
                // A concurrent init may have won; either database is usable.
                let _ = self.inner.db.set(Arc::new(Mutex::new(database)));
                self.publish_pending().await?;
                Ok(StorageMode::MemoryOnly)
            }
            Err(error) => Err(error),
        }
    }

    /// Durability of the open database
    pub async fn storage_mode(&self) -> Result<StorageMode> {
        let db = self.database().await?.lock().await;
        Ok(if db.path().is_some() {
            StorageMode::Durable
        } else {
            StorageMode::MemoryOnly
        })
    }

    async fn database(&self) -> Result<&Arc<Mutex<Database>>> {
        self.inner
            .db
            .get_or_try_init(|| async {
                self.inner.open_attempts.fetch_add(1, Ordering::SeqCst);
                let location = self.inner.location.clone();
                let database = tokio::task::spawn_blocking(move || match location {
                    StorageLocation::Path(path) => Database::open(path),
                    StorageLocation::InMemory => Database::open_in_memory(),
                })
                .await
                .map_err(|error| Error::StorageUnavailable(error.to_string()))??;

                let pending = MutationQueue::new(database.connection()).size()?;
                self.inner.status.set_pending(pending);
                tracing::debug!(pending, "Local store initialized");
                Ok(Arc::new(Mutex::new(database)))
            })
            .await
    }

    /// Run `f` against the database on the blocking pool.
    ///
    /// `SQLite` calls block on disk I/O (every commit waits for an fsync), so
    /// they never run on a runtime worker.
    async fn with_db<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Database) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let mut db = Arc::clone(self.database().await?).lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut db))
            .await
            .map_err(|error| Error::StorageUnavailable(format!("storage task failed: {error}")))?
    }

    /// Run `f` in one transaction and publish the resulting queue size.
    async fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let status = self.inner.status.clone();
        self.with_db(move |db| {
            let tx = db.connection_mut().transaction()?;
            let result = f(&tx)?;
            let pending = MutationQueue::new(&tx).size()?;
            tx.commit()?;
            // Published under the lock so concurrent writers cannot reorder counts.
            status.set_pending(pending);
            Ok(result)
        })
        .await
    }

    /// Like [`LocalStore::transact`], and wake the sync driver afterwards.
    async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = self.transact(f).await?;
        self.inner.trigger.notify();
        Ok(result)
    }

    async fn publish_pending(&self) -> Result<()> {
        let pending = self.pending_count().await?;
        self.inner.status.set_pending(pending);
        Ok(())
    }

    /// Store a new entity: assigns id and timestamps, marks it dirty.
    pub async fn add<T: EntityData>(&self, data: T) -> Result<Record<T>> {
        self.add_record(Record::new(data)).await
    }

    /// Store a caller-constructed record under its own id.
    ///
    /// Fails with [`Error::InvalidInput`] if the id already exists.
    pub async fn add_record<T: EntityData>(&self, mut record: Record<T>) -> Result<Record<T>> {
        record.data.validate()?;
        record.dirty = true;

        let record = self
            .write(move |tx| {
                RecordRepository::new(tx).insert(&record)?;
                MutationQueue::new(tx).enqueue(T::KIND, &record.id, Operation::Create)?;
                Ok(record)
            })
            .await?;

        tracing::debug!(kind = %T::KIND, id = %record.id, "Added record");
        Ok(record)
    }

    /// Replace a record keyed by id, refreshing `updatedAt` and marking it dirty.
    ///
    /// A missing id is created ([`UpdateMode::Upsert`]) or rejected
    /// ([`UpdateMode::Strict`]) according to the store's per-kind mode.
    pub async fn update<T: EntityData>(&self, mut record: Record<T>) -> Result<Record<T>> {
        record.data.validate()?;
        let mode = self.inner.update_modes.for_kind(T::KIND);

        let record = self
            .write(move |tx| {
                let repo = RecordRepository::new(tx);
                let operation = match repo.timestamps(T::KIND, &record.id)? {
                    Some((created_at, previous)) => {
                        record.created_at = created_at;
                        record.updated_at = next_version(previous);
                        Operation::Update
                    }
                    None if mode == UpdateMode::Strict => {
                        return Err(Error::not_found(T::KIND, record.id.as_str()));
                    }
                    None => {
                        record.updated_at = now_micros();
                        if record.created_at > record.updated_at {
                            record.created_at = record.updated_at;
                        }
                        Operation::Create
                    }
                };
                record.dirty = true;

                repo.upsert(&record)?;
                MutationQueue::new(tx).enqueue(T::KIND, &record.id, operation)?;
                Ok(record)
            })
            .await?;

        tracing::debug!(kind = %T::KIND, id = %record.id, "Updated record");
        Ok(record)
    }

    /// Remove a record and queue the remote delete; missing ids are a no-op.
    pub async fn delete<T: EntityData>(&self, id: &EntityId) -> Result<()> {
        self.delete_kind(T::KIND, id).await
    }

    /// Untyped [`LocalStore::delete`]
    pub async fn delete_kind(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        let target = id.clone();
        let removed = self
            .write(move |tx| {
                let removed = RecordRepository::new(tx).remove(kind, &target)?;
                if removed {
                    MutationQueue::new(tx).enqueue(kind, &target, Operation::Delete)?;
                }
                Ok(removed)
            })
            .await?;

        if removed {
            tracing::debug!(%kind, %id, "Deleted record");
        }
        Ok(())
    }

    /// Get a record by id; `None` when missing
    pub async fn get<T: EntityData>(&self, id: &EntityId) -> Result<Option<Record<T>>> {
        let id = id.clone();
        self.with_db(move |db| RecordRepository::new(db.connection()).get(&id))
            .await
    }

    /// Every record of a table
    pub async fn get_all<T: EntityData>(&self) -> Result<Vec<Record<T>>> {
        self.with_db(|db| RecordRepository::new(db.connection()).list())
            .await
    }

    /// Records whose indexed field equals `value`; empty when none match
    pub async fn get_by_index<T: EntityData>(
        &self,
        index: T::Index,
        value: &str,
    ) -> Result<Vec<Record<T>>> {
        let value = value.to_string();
        self.with_db(move |db| RecordRepository::new(db.connection()).list_by_index(index, &value))
            .await
    }

    /// Pending mutation-queue entries in enqueue order
    pub async fn pending_mutations(&self) -> Result<Vec<QueueEntry>> {
        self.with_db(|db| MutationQueue::new(db.connection()).list())
            .await
    }

    /// Count of pending mutation-queue entries
    pub async fn pending_count(&self) -> Result<usize> {
        self.with_db(|db| MutationQueue::new(db.connection()).size())
            .await
    }

    /// Untyped record lookup used by the sync engine
    pub async fn raw_record(&self, kind: EntityKind, id: &EntityId) -> Result<Option<RawRecord>> {
        let id = id.clone();
        self.with_db(move |db| RecordRepository::new(db.connection()).get_raw(kind, &id))
            .await
    }

    /// Dirty records of one table
    pub async fn dirty_records(&self, kind: EntityKind) -> Result<Vec<RawRecord>> {
        self.with_db(move |db| RecordRepository::new(db.connection()).dirty(kind))
            .await
    }

    /// Count of dirty records across every table
    pub async fn dirty_count(&self) -> Result<usize> {
        self.with_db(|db| {
            let repo = RecordRepository::new(db.connection());
            EntityKind::ALL
                .into_iter()
                .map(|kind| repo.dirty_count(kind))
                .sum()
        })
        .await
    }

    /// Remove a queue entry confirmed by the remote store
    pub async fn acknowledge(&self, seq: i64) -> Result<bool> {
        self.transact(move |tx| MutationQueue::new(tx).remove_entry(seq))
            .await
    }

    /// Remove the oldest queue entry matching the triple
    pub async fn remove_mutation(
        &self,
        kind: EntityKind,
        id: &EntityId,
        operation: Operation,
    ) -> Result<bool> {
        let id = id.clone();
        self.transact(move |tx| MutationQueue::new(tx).remove(kind, &id, operation))
            .await
    }

    /// Clear the dirty flag if the record is still at `version`
    pub async fn mark_clean(
        &self,
        kind: EntityKind,
        id: &EntityId,
        version: &DateTime<Utc>,
    ) -> Result<bool> {
        let id = id.clone();
        let version = *version;
        self.with_db(move |db| RecordRepository::new(db.connection()).mark_clean(kind, &id, &version))
            .await
    }

    #[cfg(test)]
    pub(crate) fn open_attempts(&self) -> usize {
        self.inner.open_attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CalibrationData, CalibrationResults, CustomerData, EquipmentData, EquipmentIndex,
        EquipmentType, LoadCellPoint, LoadCellResults, OverallResult, ToolCategory, ToolData,
    };
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn store_at(location: StorageLocation, modes: UpdateModes) -> (LocalStore, StatusBroadcaster) {
        let status = StatusBroadcaster::new();
        let store = LocalStore::new(location, modes, status.clone(), SyncTrigger::new());
        (store, status)
    }

    fn memory_store() -> LocalStore {
        store_at(StorageLocation::InMemory, UpdateModes::default()).0
    }

    #[tokio::test]
    async fn concurrent_init_opens_storage_once() {
        let store = memory_store();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.init().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        store.init().await.unwrap();
        assert_eq!(store.open_attempts(), 1);
    }

    #[tokio::test]
    async fn unavailable_storage_is_reported_not_panicked() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let (store, _) = store_at(
            StorageLocation::Path(blocker.join("calibrate.db")),
            UpdateModes::default(),
        );

        assert!(matches!(store.init().await, Err(Error::StorageUnavailable(_))));
        assert!(matches!(
            store.add(CustomerData::new("Acme")).await,
            Err(Error::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn degraded_store_operates_in_memory() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let (store, _) = store_at(
            StorageLocation::Path(blocker.join("calibrate.db")),
            UpdateModes::default(),
        );

        assert_eq!(store.init_or_degrade().await.unwrap(), StorageMode::MemoryOnly);
        let customer = store.add(CustomerData::new("Acme")).await.unwrap();
        assert!(store.get::<CustomerData>(&customer.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_database_file_degrades_to_memory() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("calibrate.db");
        std::fs::write(&path, vec![0x42_u8; 8 * 1024]).unwrap();
        let (store, _) = store_at(StorageLocation::Path(path), UpdateModes::default());

        assert_eq!(store.init_or_degrade().await.unwrap(), StorageMode::MemoryOnly);
        store.add(CustomerData::new("Acme")).await.unwrap();
        assert_eq!(store.get_all::<CustomerData>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_finite_readings_never_reach_the_table() {
        let store = memory_store();
        let mut calibration = CalibrationData {
            customer_id: EntityId::new(),
            equipment_id: EntityId::new(),
            calibration_type: EquipmentType::LoadCell,
            technician: "R. Diaz".to_string(),
            calibration_date: "2024-03-14".parse().unwrap(),
            temperature: None,
            humidity: None,
            tool_ids: vec![],
            results: CalibrationResults::LoadCell(LoadCellResults {
                units: Some("kN".to_string()),
                points: vec![LoadCellPoint {
                    applied_load: 10.0,
                    run_readings: vec![f64::NAN],
                }],
            }),
            overall_result: OverallResult::Pass,
        };

        assert!(matches!(
            store.add(calibration.clone()).await,
            Err(Error::InvalidInput(_))
        ));

        calibration.results = CalibrationResults::empty(EquipmentType::LoadCell);
        store.add(calibration).await.unwrap();
        assert_eq!(store.get_all::<CalibrationData>().await.unwrap().len(), 1);
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_marks_dirty_and_enqueues_create() {
        let (store, status) = store_at(StorageLocation::InMemory, UpdateModes::default());

        let customer = store.add(CustomerData::new("Acme")).await.unwrap();
        assert!(customer.dirty);

        let pending = store.pending_mutations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, customer.id);
        assert_eq!(pending[0].operation, Operation::Create);
        assert_eq!(status.current().pending_count, 1);
    }

    #[tokio::test]
    async fn add_record_never_overwrites() {
        let store = memory_store();
        let customer = store.add(CustomerData::new("Acme")).await.unwrap();

        let mut clash = customer.clone();
        clash.data.name = "Impostor".to_string();
        assert!(matches!(
            store.add_record(clash).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let stored = store.get::<CustomerData>(&customer.id).await.unwrap().unwrap();
        assert_eq!(stored.data.name, "Acme");
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_writing() {
        let store = memory_store();
        assert!(store.add(CustomerData::new(" ")).await.is_err());
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert!(store.get_all::<CustomerData>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_refreshes_version_and_keeps_created_at() {
        let store = memory_store();
        let customer = store.add(CustomerData::new("Acme")).await.unwrap();

        let mut edited = customer.clone();
        edited.data.phone = Some("555-0100".to_string());
        edited.created_at = now_micros() + chrono::Duration::days(3);
        let updated = store.update(edited).await.unwrap();

        assert!(updated.dirty);
        assert_eq!(updated.created_at, customer.created_at);
        assert!(updated.updated_at > customer.updated_at);

        let ops: Vec<Operation> = store
            .pending_mutations()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.operation)
            .collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Update]);
    }

    #[tokio::test]
    async fn update_upserts_missing_record_by_default() {
        let store = memory_store();
        let record = Record::new(EquipmentData::new(
            "Press",
            EquipmentType::LoadCell,
            EntityId::new(),
        ));

        let stored = store.update(record.clone()).await.unwrap();
        assert_eq!(stored.id, record.id);

        let fetched = store
            .get::<EquipmentData>(&record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.data, record.data);
        assert!(fetched.dirty);
        assert_eq!(
            store.pending_mutations().await.unwrap()[0].operation,
            Operation::Create
        );
    }

    #[tokio::test]
    async fn strict_update_of_missing_record_is_not_found() {
        let (store, _) = store_at(
            StorageLocation::InMemory,
            UpdateModes {
                tool: UpdateMode::Strict,
                ..UpdateModes::default()
            },
        );
        let record = Record::new(ToolData::new("Ring", ToolCategory::LoadTool));

        let result = store.update(record).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                kind: EntityKind::Tool,
                ..
            })
        ));
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = memory_store();
        let missing = EntityId::new();

        store.delete::<CustomerData>(&missing).await.unwrap();
        store.delete::<CustomerData>(&missing).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);

        let customer = store.add(CustomerData::new("Acme")).await.unwrap();
        store.delete::<CustomerData>(&customer.id).await.unwrap();
        store.delete::<CustomerData>(&customer.id).await.unwrap();

        assert!(store.get::<CustomerData>(&customer.id).await.unwrap().is_none());
        let ops: Vec<Operation> = store
            .pending_mutations()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.operation)
            .collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Delete]);
    }

    #[tokio::test]
    async fn lookups_miss_without_error() {
        let store = memory_store();
        assert!(store
            .get::<EquipmentData>(&EntityId::new())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_by_index::<EquipmentData>(EquipmentIndex::CustomerId, "nobody")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn writes_survive_restart() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("calibrate.db");

        let customer = {
            let (store, _) = store_at(StorageLocation::Path(path.clone()), UpdateModes::default());
            store.add(CustomerData::new("Acme")).await.unwrap()
        };

        let (store, status) = store_at(StorageLocation::Path(path), UpdateModes::default());
        store.init().await.unwrap();
        assert_eq!(status.current().pending_count, 1);
        let fetched = store.get::<CustomerData>(&customer.id).await.unwrap().unwrap();
        assert_eq!(fetched, customer);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_on_file_storage_all_land() {
        let tmp = tempdir().unwrap();
        let (store, status) = store_at(
            StorageLocation::Path(tmp.path().join("calibrate.db")),
            UpdateModes::default(),
        );

        let mut tasks = Vec::new();
        for n in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.add(CustomerData::new(format!("Customer {n}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get_all::<CustomerData>().await.unwrap().len(), 16);
        assert_eq!(store.pending_count().await.unwrap(), 16);
        assert_eq!(status.current().pending_count, 16);
    }
}
