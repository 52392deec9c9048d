//! Expense command handlers.

use crate::args::{AddArgs, DeleteArgs, EditArgs, PeriodArgs};
use crate::commands::{describe, flush, open, period, rows, ExpenseRow, Out};
use crate::model::{stats, Expense, Lifecycle};
use crate::period::Span;
use crate::store::Store;
use crate::Result;
use anyhow::{ensure, Context};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;

/// Records a new expense for the signed in user and tries to send it straight away. When the
/// server cannot be reached the expense stays queued and keeps its placeholder id.
pub async fn add(store: &Store, args: &AddArgs) -> Result<Out<ExpenseRow>> {
    let user = open(store, period(Span::Day, args.date())).await?;
    let mut expense = Expense::new(user.name(), args.amount());
    if let Some(date) = args.date() {
        expense.set_date(at_current_time(date));
    }
    if let Some(category) = args.category() {
        expense.set_category(Some(category_name(store, category)?));
    }
    expense.set_description(args.description().map(str::to_string));

    let before: HashSet<String> = rows(store).into_iter().map(|r| r.id).collect();
    let added = store.add_expense(expense)?;
    let waiting = flush(store).await?;

    // Once the server confirms the create, the expense carries the id the server gave it.
    let row = rows(store)
        .into_iter()
        .find(|r| !before.contains(&r.id))
        .unwrap_or_else(|| ExpenseRow::from(&added));
    let mut message = format!("Added expense {} of {}", row.id, row.amount.to_grouped());
    if let Some(waiting) = waiting {
        message.push_str(&format!(", {waiting}"));
    }
    Ok(Out::new(message, row))
}

/// Lists the expenses of a day, week or month, newest first, with their total. Changes that have
/// not reached the server yet are tagged.
pub async fn list(store: &Store, args: &PeriodArgs) -> Result<Out<Vec<ExpenseRow>>> {
    let period = period(args.span(), args.date());
    open(store, period).await?;
    let rows = rows(store);
    if rows.is_empty() {
        return Ok(Out::new(format!("No expenses {}", describe(&period)), rows));
    }

    let expenses = store.expenses().into_value().unwrap_or_default();
    let mut lines = vec![format!("Expenses {}:", describe(&period))];
    lines.extend(rows.iter().map(ExpenseRow::line));
    lines.push(format!("Total: {}", stats::total(&expenses).to_grouped()));
    Ok(Out::new(lines.join("\n"), rows))
}

/// Changes the amount, category or description of an expense in the month of `--date`.
pub async fn edit(store: &Store, args: &EditArgs) -> Result<Out<ExpenseRow>> {
    open(store, period(Span::Month, args.date())).await?;
    let mut expense = find(store, args.id())?;
    if let Some(amount) = args.amount() {
        expense.set_amount(amount);
    }
    if let Some(category) = args.category() {
        let category = if category.is_empty() {
            None
        } else {
            Some(category_name(store, category)?)
        };
        expense.set_category(category);
    }
    if let Some(description) = args.description() {
        expense.set_description(Some(description.to_string()));
    }

    let updated = store.update_expense(expense)?;
    let waiting = flush(store).await?;
    let row = store
        .expenses()
        .into_value()
        .and_then(|list| list.into_iter().find(|e| e.id() == updated.id()))
        .map(|e| ExpenseRow::from(&e))
        .unwrap_or_else(|| ExpenseRow::from(&updated));
    let mut message = format!("Updated expense {}", row.id);
    if let Some(waiting) = waiting {
        message.push_str(&format!(", {waiting}"));
    }
    Ok(Out::new(message, row))
}

/// Deletes an expense in the month of `--date`.
pub async fn delete(store: &Store, args: &DeleteArgs) -> Result<Out<ExpenseRow>> {
    open(store, period(Span::Month, args.date())).await?;
    find(store, args.id())?;
    let deleted = store.delete_expense(args.id())?;
    let waiting = flush(store).await?;
    let mut message = format!("Deleted expense {}", deleted.id());
    if let Some(waiting) = waiting {
        message.push_str(&format!(", {waiting}"));
    }
    Ok(Out::new(message, ExpenseRow::from(&deleted)))
}

/// Finds expense `id` in the current list. Expenses on their way out cannot be changed.
fn find(store: &Store, id: &str) -> Result<Expense> {
    let expense = store
        .expenses()
        .into_value()
        .and_then(|list| list.into_iter().find(|e| e.id() == id))
        .with_context(|| format!("Expense {id} was not found, try passing its --date"))?;
    ensure!(
        expense.lifecycle() != Lifecycle::Deleted,
        "Expense {id} is already being deleted"
    );
    Ok(expense)
}

/// The catalog spelling of `name`.
fn category_name(store: &Store, name: &str) -> Result<String> {
    let category = store.category(name).with_context(|| {
        let known: Vec<&str> = store.categories().iter().map(|c| c.name()).collect();
        format!(
            "Unknown category '{name}', expected one of: {}",
            known.join(", ")
        )
    })?;
    Ok(category.name().to_string())
}

/// `date` at the current local time of day.
fn at_current_time(date: NaiveDate) -> chrono::DateTime<Utc> {
    let naive = date.and_time(Local::now().time());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
