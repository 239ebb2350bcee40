//! In-memory capabilities for tests
//!
//! [`StaticInventory`] is a hand-maintained process table and
//! [`ScriptedLauncher`] replays scripted launch outcomes, optionally registering
//! every process it "starts" in an inventory so later rounds see it as live.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::capability::{
    InventoryError, LaunchError, LaunchedProcess, ProcessInfo, ProcessInventory, ProcessLauncher,
};

/// Process inventory with a fixed, editable process list
#[derive(Default)]
pub struct StaticInventory {
    processes: RwLock<Vec<ProcessInfo>>,
    unavailable: RwLock<Option<String>>,
}

impl StaticInventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live process
    pub fn add(&self, info: ProcessInfo) {
        self.processes.write().push(info);
    }

    /// Mark the process with this handle as exited
    pub fn kill(&self, handle: &str) {
        self.processes.write().retain(|p| p.handle != handle);
    }

    /// Mark every process as exited
    pub fn kill_all(&self) {
        self.processes.write().clear();
    }

    /// Make every subsequent listing fail
    pub fn set_unavailable(&self, message: impl Into<String>) {
        *self.unavailable.write() = Some(message.into());
    }
}

#[async_trait]
impl ProcessInventory for StaticInventory {
    async fn list(&self) -> Result<Vec<ProcessInfo>, InventoryError> {
        if let Some(message) = self.unavailable.read().as_ref() {
            return Err(InventoryError::Unavailable(message.clone()));
        }
        Ok(self.processes.read().clone())
    }
}

/// Launcher replaying scripted outcomes
///
/// Once the script is exhausted every call succeeds with a fresh process id.
/// The call count is owned by the instance.
pub struct ScriptedLauncher {
    script: Mutex<VecDeque<Result<LaunchedProcess, LaunchError>>>,
    calls: AtomicUsize,
    next_pid: AtomicUsize,
    inventory: Option<Arc<StaticInventory>>,
}

impl ScriptedLauncher {
    /// A launcher whose every call succeeds
    pub fn succeeding() -> Self {
        Self::from_outcomes(Vec::new())
    }

    /// A launcher replaying `outcomes` in order
    pub fn from_outcomes(outcomes: Vec<Result<LaunchedProcess, LaunchError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            next_pid: AtomicUsize::new(1000),
            inventory: None,
        }
    }

    /// A launcher failing on the given 1-based call numbers and succeeding otherwise
    pub fn failing_on(calls: &[usize]) -> Self {
        let last = calls.iter().copied().max().unwrap_or(0);
        let launcher = Self::succeeding();
        let outcomes = (1..=last)
            .map(|n| {
                if calls.contains(&n) {
                    Err(LaunchError::Spawn(format!("scripted failure on call {n}")))
                } else {
                    Ok(launcher.fresh_process())
                }
            })
            .collect::<Vec<_>>();
        *launcher.script.lock() = outcomes.into();
        launcher
    }

    /// Register every successfully launched process in `inventory`
    pub fn with_inventory(mut self, inventory: Arc<StaticInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Number of launch attempts so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fresh_process(&self) -> LaunchedProcess {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let started_at = Utc::now();
        LaunchedProcess::new(pid.to_string())
            .with_handle(format!("{}.{}", pid, started_at.timestamp()))
            .with_started_at(started_at)
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<LaunchedProcess, LaunchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.script.lock().pop_front();
        let launched = match scripted {
            Some(outcome) => outcome?,
            None => self.fresh_process(),
        };

        if let (Some(inventory), Some(handle)) = (&self.inventory, &launched.handle) {
            let mut info = ProcessInfo::new(launched.process_id.clone(), handle.clone());
            if let Some(started_at) = launched.started_at {
                info = info.with_started_at(started_at);
            }
            inventory.add(info);
        }

        Ok(launched)
    }
}
