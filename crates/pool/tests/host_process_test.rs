//! Reconciliation rounds against real OS processes
//!
//! Uses `SysinfoInventory` and `CommandLauncher` with the `sleep` binary.
//!
//! Run with: cargo test -p pidwarden-pool --test host_process_test

use std::sync::Arc;

use pidwarden_pool::capability::{CommandLauncher, SysinfoInventory};
use pidwarden_pool::manager::{WorkerManager, WorkerManagerConfig};
use pidwarden_pool::persistence::InMemorySlotStore;

fn manager(inventory: SysinfoInventory, target: i64) -> WorkerManager {
    WorkerManager::new(
        WorkerManagerConfig::new("host-test", target),
        Arc::new(InMemorySlotStore::new()),
        Arc::new(inventory),
        Arc::new(CommandLauncher::new("sleep", ["5"])),
    )
    .expect("valid config")
}

#[test_log::test(tokio::test)]
async fn test_worker_outside_name_filter_is_never_bound() {
    let manager = manager(
        SysinfoInventory::new().with_name_filter("no-such-worker-name"),
        1,
    );

    for _ in 0..3 {
        let report = manager.run_round().await.unwrap();

        // The process is not visible to later rounds, so binding it would
        // relaunch on every round while the old process keeps running
        assert!(report.launched.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert!(report.table.is_empty());
    }
}

#[test_log::test(tokio::test)]
async fn test_worker_matching_name_filter_stays_bound() {
    let manager = manager(SysinfoInventory::new().with_name_filter("sleep"), 1);

    let first = manager.run_round().await.unwrap();
    let second = manager.run_round().await.unwrap();

    assert_eq!(first.launched.len(), 1);
    assert!(second.launched.is_empty());
    assert!(second.dropped.is_empty());
    assert_eq!(first.table, second.table);
}
