//! Busy/free partitioning, stale detection and pool resizing

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument, warn};

use super::config::WorkerManagerConfig;
use crate::slot::{Slot, SlotTable};

/// A busy slot that exceeded the stale threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleSlot {
    /// The slot as stored, left bound to its process
    pub slot: Slot,

    /// How long the bound process has been running
    pub elapsed: Duration,
}

/// Result of reconciling a slot table against the live process set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Slots whose process is still live, in table order (carried over as-is)
    pub busy: Vec<Slot>,

    /// Slots to (re)launch: surviving free slots in table order, then new slots
    pub free: Vec<Slot>,

    /// Free slots removed to shrink the pool
    pub evicted: Vec<Slot>,

    /// Busy slots past the stale threshold
    pub stale: Vec<StaleSlot>,
}

/// Decides which slots are free, which are stale, and how the pool is resized
#[derive(Debug, Clone)]
pub struct Reconciler {
    owner_name: String,
    target: usize,
    stale_after: Duration,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(owner_name: impl Into<String>, target: usize, stale_after: Duration) -> Self {
        Self {
            owner_name: owner_name.into(),
            target,
            stale_after,
        }
    }

    /// Create a reconciler from a validated manager configuration
    pub fn from_config(config: &WorkerManagerConfig) -> Self {
        Self::new(config.owner_name.clone(), config.target(), config.stale_after)
    }

    /// Reconcile `table` against the set of live process handles as of `now`
    #[instrument(skip_all, fields(owner = %self.owner_name, slots = table.len(), target = self.target))]
    pub fn reconcile(
        &self,
        table: &SlotTable,
        live_handles: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let mut result = Reconciliation::default();

        for slot in table {
            if slot.is_bound() && live_handles.contains(&slot.process_handle) {
                if let Some(stale) = self.check_stale(slot, now) {
                    result.stale.push(stale);
                }
                result.busy.push(slot.clone());
            } else {
                result.free.push(slot.clone());
            }
        }

        let count = table.len();
        if count < self.target {
            for _ in count..self.target {
                result.free.push(Slot::new(self.owner_name.clone()));
            }
            debug!(created = self.target - count, "growing pool");
        } else if count > self.target {
            let excess = count - self.target;
            if result.free.len() < excess {
                // Not enough free slots to reach the target: evict all of them and
                // launch nothing this round. Busy slots stay.
                result.evicted = std::mem::take(&mut result.free);
                warn!(
                    owner = %self.owner_name,
                    busy = result.busy.len(),
                    evicted = result.evicted.len(),
                    "cannot shrink to target, remaining slots are busy"
                );
            } else {
                result.evicted = result.free.drain(..excess).collect();
                debug!(evicted = excess, "shrinking pool");
            }
        }

        if result.free.is_empty() {
            debug!("no free slots");
        }

        result
    }

    fn check_stale(&self, slot: &Slot, now: DateTime<Utc>) -> Option<StaleSlot> {
        let elapsed = slot.elapsed(now)?;
        if elapsed <= self.stale_after {
            return None;
        }

        error!(
            severity = "critical",
            alert = "slot_stale",
            owner = %self.owner_name,
            slot_id = %slot.id,
            process_id = %slot.process_id,
            elapsed_secs = elapsed.as_secs(),
            limit_secs = self.stale_after.as_secs(),
            "slot busy longer than allowed time"
        );

        Some(StaleSlot {
            slot: slot.clone(),
            elapsed,
        })
    }
}
