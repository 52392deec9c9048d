//! Spending summaries over a list of expenses: totals per category, per user and per day.
//!
//! Expenses tagged `Deleted` are left out since the user has already asked for them to go away.

use crate::model::{Expense, Lifecycle, Money};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// The bucket for expenses without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A named total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsItem {
    pub name: String,
    pub total: Money,
}

/// The expenses of one calendar day (local time) and their total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayExpenses {
    pub date: NaiveDate,
    pub total: Money,
    pub expenses: Vec<Expense>,
}

/// Totals by lowercased category name, largest first. Zero totals are dropped.
pub fn by_category(expenses: &[Expense]) -> Vec<StatsItem> {
    totals(expenses, |e| {
        e.category().unwrap_or(UNCATEGORIZED).to_lowercase()
    })
}

/// Totals by lowercased user name, largest first. Zero totals are dropped.
pub fn by_user(expenses: &[Expense]) -> Vec<StatsItem> {
    totals(expenses, |e| e.user().to_lowercase())
}

/// The sum of all live expenses.
pub fn total(expenses: &[Expense]) -> Money {
    live(expenses).map(Expense::amount).sum()
}

/// Groups expenses by local calendar day, oldest day first. Within a day, the input order is kept.
pub fn by_day(expenses: &[Expense]) -> Vec<DayExpenses> {
    let mut days: BTreeMap<NaiveDate, DayExpenses> = BTreeMap::new();
    for expense in live(expenses) {
        let date = expense.date().with_timezone(&Local).date_naive();
        let day = days.entry(date).or_insert_with(|| DayExpenses {
            date,
            total: Money::ZERO,
            expenses: Vec::new(),
        });
        day.total += expense.amount();
        day.expenses.push(expense.clone());
    }
    days.into_values().collect()
}

fn live(expenses: &[Expense]) -> impl Iterator<Item = &Expense> {
    expenses
        .iter()
        .filter(|e| e.lifecycle() != Lifecycle::Deleted)
}

fn totals<F>(expenses: &[Expense], key: F) -> Vec<StatsItem>
where
    F: Fn(&Expense) -> String,
{
    let mut map: BTreeMap<String, Money> = BTreeMap::new();
    for expense in live(expenses) {
        *map.entry(key(expense)).or_default() += expense.amount();
    }
    let mut items: Vec<StatsItem> = map
        .into_iter()
        .filter(|(_, total)| !total.is_zero())
        .map(|(name, total)| StatsItem { name, total })
        .collect();
    // BTreeMap order breaks ties by name.
    items.sort_by(|a, b| b.total.cmp(&a.total));
    items
}
