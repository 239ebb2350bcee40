//! # Worker Slot Pool
//!
//! Keeps a fixed-capacity pool of worker slots, each bound to at most one external
//! OS process, and reconciles the pool against the live process table on every run.
//!
//! ## Features
//!
//! - **Free-slot detection**: a slot whose bound process is no longer listed is relaunched
//! - **Stale alerts**: busy slots older than the configured budget raise a critical event
//! - **Resizing**: the pool grows or shrinks to the target size, never evicting busy slots
//! - **Pluggable capabilities**: launcher, process inventory and slot store are traits
//! - **Optional optimistic concurrency**: versioned writes for overlapping invocations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkerManager                           │
//! │        LOAD → RECONCILE → LAUNCH → PERSIST → RETURN          │
//! └─────────────────────────────────────────────────────────────┘
//!        │                   │                    │
//!        ▼                   ▼                    ▼
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────────┐
//! │  SlotStore   │   │  Reconciler   │   │    LaunchDriver     │
//! │ (blob "slots")│  │ (busy / free, │   │ (ProcessLauncher +  │
//! │              │   │  resize, stale)│  │  ProcessInventory)  │
//! └──────────────┘   └───────────────┘   └─────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pidwarden_pool::prelude::*;
//!
//! let config = WorkerManagerConfig::new("mailer", 4)
//!     .with_stale_after(Duration::from_secs(1800));
//!
//! let manager = WorkerManager::new(
//!     config,
//!     Arc::new(InMemorySlotStore::new()),
//!     Arc::new(SysinfoInventory::new()),
//!     Arc::new(CommandLauncher::new("php", ["worker.php"])),
//! )?;
//!
//! let table = manager.run().await?;
//! ```

pub mod capability;
pub mod manager;
pub mod persistence;
pub mod slot;
pub mod testing;

/// Prelude for common imports
pub mod prelude {
    pub use crate::capability::{
        CommandLauncher, InventoryError, LaunchError, LaunchedProcess, ProcessInfo,
        ProcessInventory, ProcessLauncher, SysinfoInventory,
    };
    pub use crate::manager::{
        inspect, ConcurrencyMode, ConfigError, LaunchDriver, LaunchOutcome, ManagerError,
        Reconciler, Reconciliation, RoundReport, SlotStatus, WorkerManager, WorkerManagerConfig,
    };
    pub use crate::persistence::{
        FileSlotStore, InMemorySlotStore, PostgresSlotStore, SlotStore, StoreError, StoredBlob,
        WritePrecondition,
    };
    pub use crate::slot::{CodecError, Slot, SlotTable};
    pub use std::time::Duration;
}

// Re-export key types at crate root
pub use capability::{
    InventoryError, LaunchError, LaunchedProcess, ProcessInfo, ProcessInventory, ProcessLauncher,
};
pub use manager::{
    ConcurrencyMode, ConfigError, ManagerError, RoundReport, WorkerManager, WorkerManagerConfig,
};
pub use persistence::{InMemorySlotStore, SlotStore, StoreError, StoredBlob, WritePrecondition};
pub use slot::{CodecError, Slot, SlotTable};
