//! Binds launched processes into free slots

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, instrument};

use crate::capability::{LaunchError, ProcessInventory, ProcessLauncher};
use crate::slot::Slot;

/// Outcome of relaunching one free slot
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The slot is now bound to a live process
    Bound(Slot),

    /// The launch failed; the slot is dropped from the table
    Dropped { slot: Slot, error: LaunchError },
}

impl LaunchOutcome {
    /// The bound slot, if the launch succeeded
    pub fn bound(&self) -> Option<&Slot> {
        match self {
            Self::Bound(slot) => Some(slot),
            Self::Dropped { .. } => None,
        }
    }

    /// Id of the slot this outcome is for
    pub fn slot_id(&self) -> &str {
        match self {
            Self::Bound(slot) | Self::Dropped { slot, .. } => &slot.id,
        }
    }
}

/// Launches one process per free slot, one at a time
///
/// A failed launch never aborts the round: the slot is dropped and the next one
/// is attempted.
pub struct LaunchDriver {
    launcher: Arc<dyn ProcessLauncher>,
    inventory: Arc<dyn ProcessInventory>,
}

impl LaunchDriver {
    /// Create a driver
    pub fn new(launcher: Arc<dyn ProcessLauncher>, inventory: Arc<dyn ProcessInventory>) -> Self {
        Self {
            launcher,
            inventory,
        }
    }

    /// Launch a process for every free slot, in order
    #[instrument(skip_all, fields(slots = free.len()))]
    pub async fn launch(&self, free: Vec<Slot>) -> Vec<LaunchOutcome> {
        let mut outcomes = Vec::with_capacity(free.len());

        for slot in free {
            match self.launch_one(&slot).await {
                Ok(bound) => {
                    debug!(
                        slot_id = %bound.id,
                        process_id = %bound.process_id,
                        "slot bound to new process"
                    );
                    outcomes.push(LaunchOutcome::Bound(bound));
                }
                Err(e) => {
                    error!(slot_id = %slot.id, error = %e, "failed to launch worker, dropping slot");
                    outcomes.push(LaunchOutcome::Dropped { slot, error: e });
                }
            }
        }

        outcomes
    }

    async fn launch_one(&self, slot: &Slot) -> Result<Slot, LaunchError> {
        let launched = self.launcher.launch().await?;

        let (handle, started_at) = match launched.handle {
            Some(handle) => (handle, launched.started_at),
            None => {
                let info = self
                    .inventory
                    .describe(&launched.process_id)
                    .await?
                    .ok_or_else(|| LaunchError::ProcessNotFound(launched.process_id.clone()))?;
                (info.handle, launched.started_at.or(info.started_at))
            }
        };

        Ok(slot.bind(
            launched.process_id,
            handle,
            started_at.unwrap_or_else(Utc::now),
        ))
    }
}
