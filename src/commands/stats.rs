use crate::args::PeriodArgs;
use crate::commands::{describe, open, period, Out};
use crate::model::stats::{self, StatsItem};
use crate::model::Money;
use crate::store::Store;
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;

/// Spending totals for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub total: Money,
    pub by_category: Vec<StatsItem>,
    pub by_user: Vec<StatsItem>,
}

/// Totals by category and by user for a day, week or month. Expenses being deleted do not count.
pub async fn stats(store: &Store, args: &PeriodArgs) -> Result<Out<Stats>> {
    let period = period(args.span(), args.date());
    open(store, period).await?;
    let expenses = store.expenses().into_value().unwrap_or_default();
    let totals = Stats {
        begin: period.begin().date_naive(),
        end: period.end().date_naive(),
        total: stats::total(&expenses),
        by_category: stats::by_category(&expenses),
        by_user: stats::by_user(&expenses),
    };

    let mut lines = vec![format!(
        "Spent {} {}",
        totals.total.to_grouped(),
        describe(&period)
    )];
    section(&mut lines, "By category", &totals.by_category);
    section(&mut lines, "By user", &totals.by_user);
    Ok(Out::new(lines.join("\n"), totals))
}

fn section(lines: &mut Vec<String>, title: &str, items: &[StatsItem]) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("  {:<16} {:>12}", item.name, item.total.to_grouped()));
    }
}
