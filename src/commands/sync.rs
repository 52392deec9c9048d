use crate::commands::{ExpenseRow, Out};
use crate::queue::PendingOperation;
use crate::store::Store;
use crate::sync::DrainOutcome;
use crate::Result;
use anyhow::anyhow;
use chrono::{DateTime, Local};

/// Lists the changes that have not reached the server, oldest first.
pub async fn pending(store: &Store) -> Result<Out<Vec<PendingOperation>>> {
    let ops = store.pending()?;
    if ops.is_empty() {
        return Ok(Out::new("Nothing is waiting for the server", ops));
    }
    let mut lines = vec![format!("{} change(s) waiting for the server:", ops.len())];
    for op in &ops {
        let queued = DateTime::from_timestamp_millis(op.timestamp())
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let expense = op
            .expense()
            .map(|e| ExpenseRow::from(&e).line())
            .unwrap_or_else(|| format!("expense {}", op.expense_id().unwrap_or("?")));
        lines.push(format!("{queued}  {:<6}  {expense}", op.kind()));
    }
    Ok(Out::new(lines.join("\n"), ops))
}

/// Sends the queued changes now. Fails when a change could not be sent; it stays queued.
pub async fn sync(store: &Store) -> Result<Out<usize>> {
    match store.sync_pending().await? {
        DrainOutcome::Drained { processed: 0 } => Ok(Out::new("Nothing to send", 0)),
        DrainOutcome::Drained { processed } => Ok(Out::new(
            format!("Sent {processed} change(s) to the server"),
            processed,
        )),
        DrainOutcome::Busy => Ok("Another sync is already running".into()),
        DrainOutcome::Halted { processed, error } => Err(anyhow!(
            "Sent {processed} change(s), {} still waiting: {error:#}",
            store.pending()?.len()
        )),
    }
}
