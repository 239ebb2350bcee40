// Show command

use anyhow::{Context as _, Result};
use pidwarden_pool::manager::{inspect, SlotStatus};

use super::{format_started_at, or_dash, Context};
use crate::output::{print_table_header, print_table_row};

pub async fn run(ctx: &Context) -> Result<()> {
    let statuses = inspect(&ctx.config, ctx.store.as_ref(), ctx.inventory.as_ref())
        .await
        .context("failed to inspect slots")?;

    if !ctx.output.is_text() {
        return ctx.output.print_value(&statuses);
    }

    if statuses.is_empty() {
        if !ctx.quiet {
            println!("No slots stored for {}.", ctx.config.owner_name);
        }
        return Ok(());
    }

    if ctx.quiet {
        for status in &statuses {
            println!("{}\t{}", status.slot.id, state_label(status));
        }
        return Ok(());
    }

    print_table_header(&[
        ("ID", 48),
        ("PID", 8),
        ("STATE", 6),
        ("STARTED", 19),
        ("ELAPSED", 10),
    ]);
    for status in &statuses {
        let elapsed = status
            .elapsed_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "-".to_string());
        print_table_row(&[
            (&status.slot.id, 48),
            (or_dash(&status.slot.process_id), 8),
            (state_label(status), 6),
            (&format_started_at(status.slot.started_at), 19),
            (&elapsed, 10),
        ]);
    }

    Ok(())
}

fn state_label(status: &SlotStatus) -> &'static str {
    match (status.live, status.stale) {
        (true, true) => "stale",
        (true, false) => "busy",
        (false, _) => "free",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidwarden_pool::slot::Slot;

    fn status(live: bool, stale: bool) -> SlotStatus {
        SlotStatus {
            slot: Slot::new("mailer"),
            live,
            elapsed_secs: None,
            stale,
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(state_label(&status(true, false)), "busy");
        assert_eq!(state_label(&status(true, true)), "stale");
        assert_eq!(state_label(&status(false, false)), "free");
    }
}
