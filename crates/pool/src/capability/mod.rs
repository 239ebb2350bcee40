//! External process capabilities
//!
//! This module provides:
//! - [`ProcessLauncher`] trait - starts one external process per call
//! - [`ProcessInventory`] trait - lists live processes and describes one by id
//! - [`CommandLauncher`] - launcher spawning a detached OS command
//! - [`SysinfoInventory`] - inventory backed by the host process table

mod inventory;
mod launcher;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use inventory::SysinfoInventory;
pub use launcher::CommandLauncher;

/// Error type for process inventory operations
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The process table could not be read
    #[error("process table unavailable: {0}")]
    Unavailable(String),
}

/// Error type for launch attempts
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The process could not be spawned
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    /// The process was spawned but is not visible in the inventory
    #[error("process {0} not found after launch")]
    ProcessNotFound(String),

    /// Inventory lookup failed while resolving the process handle
    #[error("inventory lookup failed: {0}")]
    Inventory(#[from] InventoryError),
}

/// A live process as reported by the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// OS process id
    pub process_id: String,

    /// Handle identifying this process instance
    pub handle: String,

    /// When the process started, if known
    pub started_at: Option<DateTime<Utc>>,

    /// Supplementary details (name, command line, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProcessInfo {
    /// Create process info with no start time or metadata
    pub fn new(process_id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            handle: handle.into(),
            started_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the start time
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedProcess {
    /// OS process id of the started process
    pub process_id: String,

    /// Process handle, when the launcher can supply it directly
    pub handle: Option<String>,

    /// Start time, when the launcher can supply it directly
    pub started_at: Option<DateTime<Utc>>,
}

impl LaunchedProcess {
    /// A launch result carrying only the process id
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            handle: None,
            started_at: None,
        }
    }

    /// Set the process handle
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Set the start time
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// Starts external worker processes
///
/// One call is one process start attempt.
#[async_trait]
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Start one process
    async fn launch(&self) -> Result<LaunchedProcess, LaunchError>;
}

/// Read-only view of the host's live processes
#[async_trait]
pub trait ProcessInventory: Send + Sync + 'static {
    /// List every live process
    async fn list(&self) -> Result<Vec<ProcessInfo>, InventoryError>;

    /// Describe one live process by its OS process id
    async fn describe(&self, process_id: &str) -> Result<Option<ProcessInfo>, InventoryError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|p| p.process_id == process_id))
    }
}
