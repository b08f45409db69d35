//! Service facade used by every Calibrate interface.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::local_store::{LocalStore, StorageLocation, StorageMode, UpdateModes};
use crate::config::SyncSettings;
use crate::connectivity::{
    ConnectivityMonitor, HttpReachabilityProbe, NoRemoteEndpoint, ReachabilityProbe,
    DEFAULT_PROBE_INTERVAL,
};
use crate::error::Result;
use crate::models::{
    Calibration, CalibrationData, CalibrationIndex, Customer, CustomerData, CustomerIndex,
    EntityId, Equipment, EquipmentData, EquipmentIndex, Tool, ToolData, ToolIndex,
};
use crate::queue::QueueEntry;
use crate::status::{StatusBroadcaster, Subscription, SyncStatus};
use crate::sync::{
    spawn_sync_driver, DisabledRemote, HttpRemoteStore, RemoteStore, SyncEngine, SyncOutcome,
    SyncTrigger, DEFAULT_SYNC_ITEM_TIMEOUT,
};

/// Construction options for [`CalibrationService`]
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub location: StorageLocation,
    pub update_modes: UpdateModes,
    pub probe_interval: Duration,
    pub item_timeout: Duration,
}

impl ServiceOptions {
    pub fn new(location: StorageLocation) -> Self {
        Self {
            location,
            update_modes: UpdateModes::default(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            item_timeout: DEFAULT_SYNC_ITEM_TIMEOUT,
        }
    }
}

/// Handles of the connectivity monitor and sync driver tasks
#[derive(Debug)]
pub struct BackgroundTasks {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Token cancelling every background task
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::warn!("Background task ended abnormally: {error}");
            }
        }
    }
}

/// Offline-first calibration records service.
///
/// Cheap to clone; every clone shares the same store, monitor and engine.
#[derive(Debug, Clone)]
pub struct CalibrationService {
    store: LocalStore,
    status: StatusBroadcaster,
    connectivity: ConnectivityMonitor,
    engine: SyncEngine,
    trigger: SyncTrigger,
}

impl CalibrationService {
    /// Wire a service around explicit collaborators.
    pub fn new(
        options: ServiceOptions,
        remote: Arc<dyn RemoteStore>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        let status = StatusBroadcaster::new();
        let trigger = SyncTrigger::new();
        let store = LocalStore::new(
            options.location,
            options.update_modes,
            status.clone(),
            trigger.clone(),
        );
        let connectivity = ConnectivityMonitor::new(probe, status.clone(), options.probe_interval);
        let engine = SyncEngine::new(
            store.clone(),
            remote,
            connectivity.clone(),
            status.clone(),
            options.item_timeout,
        );

        Self {
            store,
            status,
            connectivity,
            engine,
            trigger,
        }
    }

    /// Build a service from [`SyncSettings`].
    ///
    /// Without an API URL the service is local-only: connectivity stays
    /// offline and the remote never has credentials.
    /// that never has credentials.
    pub fn from_settings(location: StorageLocation, settings: &SyncSettings) -> Result<Self> {
        let options = ServiceOptions {
            probe_interval: settings.probe_interval,
            item_timeout: settings.item_timeout,
            ..ServiceOptions::new(location)
        };

        let Some(api_url) = settings.api_url.as_deref() else {
            tracing::info!("Running in local-only mode (no API URL configured)");
            return Ok(Self::new(
                options,
                Arc::new(DisabledRemote),
                Arc::new(NoRemoteEndpoint),
            ));
        };

        let remote = HttpRemoteStore::new(api_url, settings.api_token.clone())?;
        if !remote.has_credentials() {
            tracing::info!("No API token configured; sync disabled");
        }
        let probe = HttpReachabilityProbe::new(api_url, settings.probe_timeout)?;
        Ok(Self::new(options, Arc::new(remote), Arc::new(probe)))
    }

    /// Open storage and apply the schema; safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        self.store.init().await
    }

    /// Open storage, falling back to memory-only operation.
    pub async fn init_or_degrade(&self) -> Result<StorageMode> {
        self.store.init_or_degrade().await
    }

    /// Spawn the connectivity monitor and the sync driver.
    pub fn start(&self) -> BackgroundTasks {
        let shutdown = CancellationToken::new();

        let monitor = {
            let connectivity = self.connectivity.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { connectivity.run(shutdown).await })
        };
        let driver = spawn_sync_driver(self.engine.clone(), self.trigger.clone(), shutdown.clone());

        BackgroundTasks {
            shutdown,
            handles: vec![monitor, driver],
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    // Customers

    /// Create a customer.
    pub async fn add_customer(&self, data: CustomerData) -> Result<Customer> {
        self.store.add(data).await
    }

    /// Replace a customer keyed by id.
    pub async fn update_customer(&self, customer: Customer) -> Result<Customer> {
        self.store.update(customer).await
    }

    /// Delete a customer; missing ids are a no-op.
    pub async fn delete_customer(&self, id: &EntityId) -> Result<()> {
        self.store.delete::<CustomerData>(id).await
    }

    /// List every customer.
    pub async fn get_all_customers(&self) -> Result<Vec<Customer>> {
        self.store.get_all().await
    }

    /// Fetch a customer by id.
    pub async fn get_customer_by_id(&self, id: &EntityId) -> Result<Option<Customer>> {
        self.store.get(id).await
    }

    /// Customers whose indexed field equals `value`.
    pub async fn get_customers_by_index(
        &self,
        index: CustomerIndex,
        value: &str,
    ) -> Result<Vec<Customer>> {
        self.store.get_by_index::<CustomerData>(index, value).await
    }

    // Equipment

    /// Create an equipment record.
    pub async fn add_equipment(&self, data: EquipmentData) -> Result<Equipment> {
        self.store.add(data).await
    }

    /// Replace an equipment record keyed by id.
    pub async fn update_equipment(&self, equipment: Equipment) -> Result<Equipment> {
        self.store.update(equipment).await
    }

    /// Delete an equipment record; missing ids are a no-op.
    pub async fn delete_equipment(&self, id: &EntityId) -> Result<()> {
        self.store.delete::<EquipmentData>(id).await
    }

    /// List every equipment record.
    pub async fn get_all_equipment(&self) -> Result<Vec<Equipment>> {
        self.store.get_all().await
    }

    /// Fetch an equipment record by id.
    pub async fn get_equipment_by_id(&self, id: &EntityId) -> Result<Option<Equipment>> {
        self.store.get(id).await
    }

    /// Equipment whose indexed field equals `value`.
    pub async fn get_equipment_by_index(
        &self,
        index: EquipmentIndex,
        value: &str,
    ) -> Result<Vec<Equipment>> {
        self.store.get_by_index::<EquipmentData>(index, value).await
    }

    // Tools

    /// Create a tool.
    pub async fn add_tool(&self, data: ToolData) -> Result<Tool> {
        self.store.add(data).await
    }

    /// Replace a tool keyed by id.
    pub async fn update_tool(&self, tool: Tool) -> Result<Tool> {
        self.store.update(tool).await
    }

    /// Delete a tool; missing ids are a no-op.
    pub async fn delete_tool(&self, id: &EntityId) -> Result<()> {
        self.store.delete::<ToolData>(id).await
    }

    /// List every tool.
    pub async fn get_all_tools(&self) -> Result<Vec<Tool>> {
        self.store.get_all().await
    }

    /// Fetch a tool by id.
    pub async fn get_tool_by_id(&self, id: &EntityId) -> Result<Option<Tool>> {
        self.store.get(id).await
    }

    /// Tools whose indexed field equals `value`.
    pub async fn get_tools_by_index(&self, index: ToolIndex, value: &str) -> Result<Vec<Tool>> {
        self.store.get_by_index::<ToolData>(index, value).await
    }

    // Calibrations

    /// Create a calibration.
    pub async fn add_calibration(&self, data: CalibrationData) -> Result<Calibration> {
        self.store.add(data).await
    }

    /// Replace a calibration keyed by id.
    pub async fn update_calibration(&self, calibration: Calibration) -> Result<Calibration> {
        self.store.update(calibration).await
    }

    /// Delete a calibration; missing ids are a no-op.
    pub async fn delete_calibration(&self, id: &EntityId) -> Result<()> {
        self.store.delete::<CalibrationData>(id).await
    }

    /// List every calibration.
    pub async fn get_all_calibrations(&self) -> Result<Vec<Calibration>> {
        self.store.get_all().await
    }

    /// Fetch a calibration by id.
    pub async fn get_calibration_by_id(&self, id: &EntityId) -> Result<Option<Calibration>> {
        self.store.get(id).await
    }

    /// Calibrations whose indexed field equals `value`.
    pub async fn get_calibrations_by_index(
        &self,
        index: CalibrationIndex,
        value: &str,
    ) -> Result<Vec<Calibration>> {
        self.store.get_by_index::<CalibrationData>(index, value).await
    }

    // Sync

    /// Receive the current status now and every later change.
    pub fn subscribe_to_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(callback)
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    /// Status receiver for async consumers
    pub fn watch_status(&self) -> tokio::sync::watch::Receiver<SyncStatus> {
        self.status.watch()
    }

    /// Re-evaluate connectivity, then run a sync cycle now.
    pub async fn force_sync(&self) -> SyncOutcome {
        self.connectivity.refresh().await;
        self.engine.sync_now().await
    }

    /// Count of mutations not yet confirmed by the remote store
    pub async fn pending_count(&self) -> Result<usize> {
        self.store.pending_count().await
    }

    /// Mutations not yet confirmed by the remote store, oldest first
    pub async fn pending_mutations(&self) -> Result<Vec<QueueEntry>> {
        self.store.pending_mutations().await
    }
}
