//! Process inventory backed by the host process table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use super::{InventoryError, ProcessInfo, ProcessInventory};

/// Inventory reading the local process table through `sysinfo`
///
/// The handle of a process is `<pid>.<start time in unix seconds>`, so a recycled
/// pid never matches the handle of the process that previously held it.
///
/// # Example
///
/// ```
/// use pidwarden_pool::capability::SysinfoInventory;
///
/// let inventory = SysinfoInventory::new().with_name_filter("php");
/// ```
pub struct SysinfoInventory {
    system: Mutex<System>,
    name_filter: Option<String>,
}

impl SysinfoInventory {
    /// Create an inventory over every process on the host
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            name_filter: None,
        }
    }

    /// Only list processes whose name contains `filter`
    pub fn with_name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    /// Build the handle for a process instance
    pub fn handle_for(pid: Pid, start_time: u64) -> String {
        format!("{}.{}", pid.as_u32(), start_time)
    }

    fn matches_filter(&self, process: &Process) -> bool {
        match &self.name_filter {
            Some(filter) => process.name().to_string_lossy().contains(filter.as_str()),
            None => true,
        }
    }

    fn to_info(process: &Process) -> ProcessInfo {
        let start_time = process.start_time();
        let mut info = ProcessInfo::new(
            process.pid().as_u32().to_string(),
            Self::handle_for(process.pid(), start_time),
        )
        .with_metadata("name", process.name().to_string_lossy());

        if let Some(started_at) = DateTime::<Utc>::from_timestamp(start_time as i64, 0) {
            info = info.with_started_at(started_at);
        }
        info
    }
}

impl Default for SysinfoInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessInventory for SysinfoInventory {
    async fn list(&self) -> Result<Vec<ProcessInfo>, InventoryError> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());

        let processes: Vec<ProcessInfo> = system
            .processes()
            .values()
            .filter(|p| self.matches_filter(p))
            .map(Self::to_info)
            .collect();

        debug!(count = processes.len(), "listed live processes");
        Ok(processes)
    }

    async fn describe(&self, process_id: &str) -> Result<Option<ProcessInfo>, InventoryError> {
        let pid: u32 = match process_id.parse() {
            Ok(pid) => pid,
            Err(_) => return Ok(None),
        };
        let pid = Pid::from_u32(pid);

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new(),
        );

        // A process outside the filter is never listed, so it must not be described either
        Ok(system
            .process(pid)
            .filter(|p| self.matches_filter(p))
            .map(Self::to_info))
    }
}
