// CLI command implementations

pub mod run;
pub mod show;

use std::sync::Arc;

use pidwarden_pool::capability::ProcessInventory;
use pidwarden_pool::manager::WorkerManagerConfig;
use pidwarden_pool::persistence::SlotStore;

use crate::output::OutputFormat;

/// Everything a command needs, resolved from the global flags
pub struct Context {
    pub config: WorkerManagerConfig,
    pub store: Arc<dyn SlotStore>,
    pub inventory: Arc<dyn ProcessInventory>,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Format an optional start time for text output
pub(crate) fn format_started_at(started_at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    started_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
