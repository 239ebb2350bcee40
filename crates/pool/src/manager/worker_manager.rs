//! Worker manager orchestration

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::config::{ConcurrencyMode, ConfigError, WorkerManagerConfig};
use super::driver::{LaunchDriver, LaunchOutcome};
use super::reconciler::{Reconciler, Reconciliation, StaleSlot};
use crate::capability::{InventoryError, ProcessInventory, ProcessLauncher};
use crate::persistence::{SlotStore, StoreError, WritePrecondition};
use crate::slot::{CodecError, Slot, SlotTable};

/// Worker manager errors
///
/// Any of these aborts the whole round. Per-slot launch failures are not errors;
/// they show up as dropped slots in the [`RoundReport`].
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Process inventory error
    #[error("process inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Stored slot table could not be decoded or encoded
    #[error("slot table error: {0}")]
    Codec(#[from] CodecError),
}

/// Everything one reconciliation round did
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// The persisted slot table
    pub table: SlotTable,

    /// Ids of slots bound to a new process this round
    pub launched: Vec<String>,

    /// Ids of slots dropped after a failed launch
    pub dropped: Vec<String>,

    /// Ids of free slots removed to shrink the pool
    pub evicted: Vec<String>,

    /// Busy slots past the stale threshold
    pub stale: Vec<StaleSlot>,

    /// Store version written by this round
    pub version: i64,
}

/// Live state of one slot, as reported by [`WorkerManager::status`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    #[serde(flatten)]
    pub slot: Slot,

    /// Whether the bound process is currently live
    pub live: bool,

    /// Seconds the bound process has been running, when known
    pub elapsed_secs: Option<u64>,

    /// Whether the slot is past the stale threshold
    pub stale: bool,
}

/// Keeps a pool of slots bound to live processes
///
/// Each call to [`run`](Self::run) is one reconciliation round:
/// load the slot table, find free and stale slots, resize to the target,
/// launch processes into free slots, and write the whole table back.
/// Nothing is kept in memory between rounds.
///
/// # Example
///
/// ```ignore
/// let manager = WorkerManager::new(config, store, inventory, launcher)?;
/// let table = manager.run().await?;
/// ```
pub struct WorkerManager {
    config: WorkerManagerConfig,
    reconciler: Reconciler,
    driver: LaunchDriver,
    store: Arc<dyn SlotStore>,
    inventory: Arc<dyn ProcessInventory>,
}

impl WorkerManager {
    /// Create a worker manager
    ///
    /// Fails with [`ManagerError::Config`] before touching any capability if the
    /// configuration is invalid.
    pub fn new(
        config: WorkerManagerConfig,
        store: Arc<dyn SlotStore>,
        inventory: Arc<dyn ProcessInventory>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, ManagerError> {
        config.validate()?;

        Ok(Self {
            reconciler: Reconciler::from_config(&config),
            driver: LaunchDriver::new(launcher, Arc::clone(&inventory)),
            config,
            store,
            inventory,
        })
    }

    /// Run one round and return the persisted slot table
    pub async fn run(&self) -> Result<SlotTable, ManagerError> {
        Ok(self.run_round().await?.table)
    }

    /// Run one round and return the table with per-round details
    #[instrument(skip(self), fields(owner = %self.config.owner_name))]
    pub async fn run_round(&self) -> Result<RoundReport, ManagerError> {
        let (table, loaded_version) = self.load().await?;
        let live = self.live_handles().await?;

        let Reconciliation {
            busy,
            free,
            evicted,
            stale,
        } = self.reconciler.reconcile(&table, &live, Utc::now());

        let outcomes = self.driver.launch(free).await;

        let mut next: SlotTable = busy.into_iter().collect();
        let mut launched = Vec::new();
        let mut dropped = Vec::new();
        for outcome in outcomes {
            match outcome {
                LaunchOutcome::Bound(slot) => {
                    launched.push(slot.id.clone());
                    next.insert(slot);
                }
                LaunchOutcome::Dropped { slot, .. } => dropped.push(slot.id),
            }
        }

        let precondition = match self.config.concurrency {
            ConcurrencyMode::LastWriterWins => WritePrecondition::Any,
            ConcurrencyMode::Optimistic => loaded_version
                .map(WritePrecondition::Version)
                .unwrap_or(WritePrecondition::Absent),
        };
        let version = self
            .store
            .set(&self.config.store_key, next.to_blob()?, precondition)
            .await?;

        info!(
            slots = next.len(),
            launched = launched.len(),
            dropped = dropped.len(),
            evicted = evicted.len(),
            stale = stale.len(),
            version,
            "reconciliation round complete"
        );

        Ok(RoundReport {
            table: next,
            launched,
            dropped,
            evicted: evicted.into_iter().map(|s| s.id).collect(),
            stale,
            version,
        })
    }

    /// Stored slots with their live state, without changing anything
    pub async fn status(&self) -> Result<Vec<SlotStatus>, ManagerError> {
        inspect(&self.config, self.store.as_ref(), self.inventory.as_ref()).await
    }

    async fn load(&self) -> Result<(SlotTable, Option<i64>), ManagerError> {
        load_table(self.store.as_ref(), &self.config.store_key).await
    }

    async fn live_handles(&self) -> Result<HashSet<String>, ManagerError> {
        live_handles(self.inventory.as_ref()).await
    }
}

/// Report the stored slots of `config`'s owner with their live state
///
/// Read-only: nothing is launched or written.
pub async fn inspect(
    config: &WorkerManagerConfig,
    store: &dyn SlotStore,
    inventory: &dyn ProcessInventory,
) -> Result<Vec<SlotStatus>, ManagerError> {
    let (table, _) = load_table(store, &config.store_key).await?;
    let live = live_handles(inventory).await?;
    let now = Utc::now();

    Ok(table
        .into_iter()
        .map(|slot| {
            let is_live = slot.is_bound() && live.contains(&slot.process_handle);
            let elapsed = slot.elapsed(now).filter(|_| is_live);
            SlotStatus {
                live: is_live,
                elapsed_secs: elapsed.map(|e| e.as_secs()),
                stale: elapsed.is_some_and(|e| e > config.stale_after),
                slot,
            }
        })
        .collect())
}

async fn load_table(
    store: &dyn SlotStore,
    key: &str,
) -> Result<(SlotTable, Option<i64>), ManagerError> {
    match store.get(key).await? {
        Some(blob) => {
            let table = SlotTable::from_blob(&blob.data)?;
            debug!(slots = table.len(), version = blob.version, "loaded slot table");
            Ok((table, Some(blob.version)))
        }
        None => {
            debug!("no stored slot table, starting empty");
            Ok((SlotTable::new(), None))
        }
    }
}

async fn live_handles(inventory: &dyn ProcessInventory) -> Result<HashSet<String>, ManagerError> {
    Ok(inventory
        .list()
        .await?
        .into_iter()
        .map(|p| p.handle)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemorySlotStore;
    use crate::testing::{ScriptedLauncher, StaticInventory};

    fn manager_with(
        config: WorkerManagerConfig,
        store: Arc<InMemorySlotStore>,
    ) -> Result<WorkerManager, ManagerError> {
        let inventory = Arc::new(StaticInventory::new());
        let launcher = ScriptedLauncher::succeeding().with_inventory(inventory.clone());
        WorkerManager::new(config, store, inventory, Arc::new(launcher))
    }

    #[test]
    fn test_empty_owner_rejected_at_construction() {
        let result = manager_with(
            WorkerManagerConfig::new("", 3),
            Arc::new(InMemorySlotStore::new()),
        );
        assert!(matches!(
            result,
            Err(ManagerError::Config(ConfigError::EmptyOwnerName))
        ));
    }

    #[test]
    fn test_negative_target_rejected_at_construction() {
        let result = manager_with(
            WorkerManagerConfig::new("mailer", -2),
            Arc::new(InMemorySlotStore::new()),
        );
        assert!(matches!(
            result,
            Err(ManagerError::Config(ConfigError::NegativeTarget(-2)))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_fails_round() {
        let store = Arc::new(InMemorySlotStore::with_entry("slots", b"{oops".to_vec()));
        let manager = manager_with(WorkerManagerConfig::new("mailer", 1), store.clone()).unwrap();

        let result = manager.run().await;

        assert!(matches!(result, Err(ManagerError::Codec(_))));
        assert_eq!(store.version("slots"), Some(1));
    }

    #[tokio::test]
    async fn test_status_reports_live_slots() {
        let store = Arc::new(InMemorySlotStore::new());
        let manager = manager_with(WorkerManagerConfig::new("mailer", 2), store).unwrap();
        manager.run().await.unwrap();

        let status = manager.status().await.unwrap();

        assert_eq!(status.len(), 2);
        assert!(status.iter().all(|s| s.live && !s.stale));
        assert!(status.iter().all(|s| s.elapsed_secs.is_some()));
    }

    #[tokio::test]
    async fn test_custom_store_key() {
        let store = Arc::new(InMemorySlotStore::new());
        let config = WorkerManagerConfig::new("mailer", 1).with_store_key("mailer-slots");
        let manager = manager_with(config, store.clone()).unwrap();

        manager.run().await.unwrap();

        assert!(store.version("mailer-slots").is_some());
        assert!(store.version("slots").is_none());
    }
}
