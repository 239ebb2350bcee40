// Run and watch commands

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use pidwarden_pool::capability::CommandLauncher;
use pidwarden_pool::manager::{RoundReport, WorkerManager};
use pidwarden_pool::slot::SlotTable;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::{format_started_at, or_dash, Context};
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoundSummary<'a> {
    owner: &'a str,
    version: i64,
    launched: &'a [String],
    dropped: &'a [String],
    evicted: &'a [String],
    stale: Vec<StaleSummary<'a>>,
    slots: &'a SlotTable,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StaleSummary<'a> {
    id: &'a str,
    process_id: &'a str,
    elapsed_secs: u64,
}

impl<'a> RoundSummary<'a> {
    fn new(owner: &'a str, report: &'a RoundReport) -> Self {
        Self {
            owner,
            version: report.version,
            launched: &report.launched,
            dropped: &report.dropped,
            evicted: &report.evicted,
            stale: report
                .stale
                .iter()
                .map(|s| StaleSummary {
                    id: &s.slot.id,
                    process_id: &s.slot.process_id,
                    elapsed_secs: s.elapsed.as_secs(),
                })
                .collect(),
            slots: &report.table,
        }
    }
}

fn build_manager(ctx: &Context, launcher: CommandLauncher) -> Result<WorkerManager> {
    WorkerManager::new(
        ctx.config.clone(),
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.inventory),
        Arc::new(launcher),
    )
    .context("failed to create worker manager")
}

/// One reconciliation round
pub async fn run(ctx: &Context, launcher: CommandLauncher) -> Result<()> {
    let manager = build_manager(ctx, launcher)?;

    let report = manager
        .run_round()
        .await
        .context("reconciliation round failed")?;

    print_report(&ctx.config.owner_name, &report, ctx.output, ctx.quiet)
}

/// Reconciliation rounds every `interval` until Ctrl-C
///
/// A failed round is logged and the next tick runs normally.
pub async fn watch(ctx: &Context, launcher: CommandLauncher, interval: Duration) -> Result<()> {
    let manager = build_manager(ctx, launcher)?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        owner = %ctx.config.owner_name,
        interval_secs = interval.as_secs(),
        "watching worker pool"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                match manager.run_round().await {
                    Ok(report) => print_report(&ctx.config.owner_name, &report, ctx.output, ctx.quiet)?,
                    Err(e) => error!(error = %e, "reconciliation round failed"),
                }
            }
        }
    }

    Ok(())
}

fn print_report(owner: &str, report: &RoundReport, format: OutputFormat, quiet: bool) -> Result<()> {
    if !format.is_text() {
        return format.print_value(&RoundSummary::new(owner, report));
    }

    if quiet {
        for slot in &report.table {
            println!("{}", slot.id);
        }
        return Ok(());
    }

    print_field("Owner", owner);
    print_field("Version", &report.version.to_string());
    print_field("Slots", &report.table.len().to_string());
    print_field("Launched", &report.launched.len().to_string());
    if !report.dropped.is_empty() {
        print_field("Dropped", &report.dropped.join(", "));
    }
    if !report.evicted.is_empty() {
        print_field("Evicted", &report.evicted.len().to_string());
    }
    for stale in &report.stale {
        print_field(
            "Stale",
            &format!("{} ({}s)", stale.slot.id, stale.elapsed.as_secs()),
        );
    }
    println!();

    print_slot_table(&report.table, &report.launched);
    Ok(())
}

fn print_slot_table(table: &SlotTable, launched: &[String]) {
    if table.is_empty() {
        println!("No slots.");
        return;
    }

    print_table_header(&[
        ("ID", 48),
        ("PID", 8),
        ("STARTED", 19),
        ("", 8),
    ]);
    for slot in table {
        let marker = if launched.contains(&slot.id) { "new" } else { "" };
        print_table_row(&[
            (&slot.id, 48),
            (or_dash(&slot.process_id), 8),
            (&format_started_at(slot.started_at), 19),
            (marker, 8),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidwarden_pool::slot::Slot;

    #[test]
    fn test_round_summary_serializes_camel_case() {
        let slot = Slot::new("mailer").bind("42", "42.1000", chrono::Utc::now());
        let id = slot.id.clone();
        let report = RoundReport {
            table: std::iter::once(slot).collect(),
            launched: vec![id.clone()],
            dropped: vec![],
            evicted: vec![],
            stale: vec![],
            version: 3,
        };

        let value = serde_json::to_value(RoundSummary::new("mailer", &report)).unwrap();

        assert_eq!(value["owner"], "mailer");
        assert_eq!(value["version"], 3);
        assert_eq!(value["launched"][0], id.as_str());
        assert_eq!(value["slots"][id.as_str()]["processId"], "42");
    }
}
