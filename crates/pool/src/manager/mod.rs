//! Slot reconciliation and pool management
//!
//! This module provides:
//! - [`WorkerManager`] - runs one LOAD → RECONCILE → LAUNCH → PERSIST round
//! - [`Reconciler`] - splits the table into busy/free slots and resizes it
//! - [`LaunchDriver`] - binds freshly launched processes into free slots
//! - [`WorkerManagerConfig`] - validated, immutable manager configuration
//!
//! # Round
//!
//! ```text
//! ┌────────┐   ┌────────────┐   ┌──────────┐   ┌───────────┐
//! │  LOAD  │──▶│ RECONCILE  │──▶│  LAUNCH  │──▶│  PERSIST  │──▶ SlotTable
//! └────────┘   └────────────┘   └──────────┘   └───────────┘
//!  store.get    inventory.list   launcher ×N     store.set
//! ```

mod config;
mod driver;
mod reconciler;
mod worker_manager;

pub use config::{ConcurrencyMode, ConfigError, WorkerManagerConfig};
pub use driver::{LaunchDriver, LaunchOutcome};
pub use reconciler::{Reconciler, Reconciliation, StaleSlot};
pub use worker_manager::{inspect, ManagerError, RoundReport, SlotStatus, WorkerManager};
