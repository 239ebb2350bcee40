//! Persistence layer for the slot table
//!
//! This module provides:
//! - [`SlotStore`] trait for named blob get/set with versions
//! - [`InMemorySlotStore`] for testing and embedding
//! - [`FileSlotStore`] for single-host deployments driven by cron
//! - [`PostgresSlotStore`] for shared deployments

mod file;
mod memory;
mod postgres;
mod store;

pub use file::FileSlotStore;
pub use memory::InMemorySlotStore;
pub use postgres::PostgresSlotStore;
pub use store::{SlotStore, StoreError, StoredBlob, WritePrecondition, SLOTS_KEY};
