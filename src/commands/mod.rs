//! Command handlers for the expenses CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod expenses;
mod init;
mod session;
mod stats;
mod sync;

use crate::model::{Expense, Lifecycle, Money, User};
use crate::period::TimePeriod;
use crate::store::Store;
use crate::sync::DrainOutcome;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, warn};

pub use expenses::{add, delete, edit, list};
pub use init::{add_user, init};
pub use session::{login, logout, whoami};
pub use stats::{stats, Stats};
pub use sync::{pending, sync};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// An expense as commands report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseRow {
    pub id: String,
    pub user: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub lifecycle: Lifecycle,
}

impl From<&Expense> for ExpenseRow {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id().to_string(),
            user: expense.user().to_string(),
            amount: expense.amount(),
            date: expense.date(),
            description: expense.description().map(str::to_string),
            category: expense.category().map(str::to_string),
            lifecycle: expense.lifecycle(),
        }
    }
}

impl ExpenseRow {
    /// One line: `date  id  amount  category  description [lifecycle]`.
    fn line(&self) -> String {
        let mut line = format!(
            "{}  {:<16} {:>12}  {:<14} {}",
            self.date.with_timezone(&Local).format("%Y-%m-%d"),
            self.id,
            self.amount.to_grouped(),
            self.category.as_deref().unwrap_or("-"),
            self.description.as_deref().unwrap_or_default(),
        );
        if self.lifecycle != Lifecycle::Ready {
            line.push_str(&format!(" [{}]", self.lifecycle));
        }
        line.trim_end().to_string()
    }
}

/// The period of the given span that contains `date`, or today.
fn period(span: crate::period::Span, date: Option<NaiveDate>) -> TimePeriod {
    TimePeriod::containing(span, date.unwrap_or_else(|| Local::now().date_naive()))
}

/// e.g. `"on 2024-03-15"` or `"from 2024-03-11 to 2024-03-17"`.
fn describe(period: &TimePeriod) -> String {
    let begin = period.begin().format("%Y-%m-%d");
    if period.is_single_day() {
        format!("on {begin}")
    } else {
        format!("from {begin} to {}", period.end().format("%Y-%m-%d"))
    }
}

/// Restores the remembered login and shows `period`. When the server cannot be reached the period
/// shows the queued changes only.
async fn open(store: &Store, period: TimePeriod) -> Result<User> {
    let user = match store.user() {
        Some(user) => user,
        None => store
            .load_user()
            .await?
            .context("Nobody is signed in, run 'expenses login' first")?,
    };
    if let Err(e) = store.fetch_period_expenses(period).await {
        warn!("Unable to reach the server, showing local changes only: {e:#}");
        store.work_offline(period)?;
    }
    Ok(user)
}

/// Sends the queued changes and describes what is left, e.g. `"2 changes waiting for the server"`.
/// Returns `None` when the queue is empty.
async fn flush(store: &Store) -> Result<Option<String>> {
    match store.sync_pending().await? {
        DrainOutcome::Halted { error, .. } => {
            warn!("Changes are saved locally and will be sent later: {error:#}")
        }
        DrainOutcome::Busy => debug!("Another sync is already running"),
        DrainOutcome::Drained { processed } => debug!("Sent {processed} change(s)"),
    }
    let waiting = store.pending()?.len();
    Ok((waiting > 0).then(|| {
        format!(
            "{waiting} change{} waiting for the server",
            if waiting == 1 { "" } else { "s" }
        )
    }))
}

/// The rows of the current list, newest first.
fn rows(store: &Store) -> Vec<ExpenseRow> {
    store
        .expenses()
        .into_value()
        .unwrap_or_default()
        .iter()
        .map(ExpenseRow::from)
        .collect()
}
