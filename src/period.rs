//! Time periods used to scope expense fetches: a day, a week or a month in local time.

use chrono::{DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

/// The length of a period.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Span {
    #[default]
    Day,
    Week,
    Month,
}

serde_plain::derive_display_from_serialize!(Span);
serde_plain::derive_fromstr_from_deserialize!(Span);

/// The inclusive range of unix seconds sent to the server when fetching expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: i64,
    pub to: i64,
}

impl DateRange {
    pub fn contains(&self, timestamp: i64) -> bool {
        self.since <= timestamp && timestamp <= self.to
    }
}

/// A span of whole local days, from the start of `begin` to the end of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    begin: DateTime<Local>,
    end: DateTime<Local>,
    span: Span,
}

impl TimePeriod {
    /// The single day `date`.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date, Span::Day)
    }

    pub fn today() -> Self {
        Self::day(Local::now().date_naive())
    }

    pub fn this_week() -> Self {
        Self::containing(Span::Week, Local::now().date_naive())
    }

    pub fn this_month() -> Self {
        Self::containing(Span::Month, Local::now().date_naive())
    }

    /// The day, week (Monday to Sunday) or month that contains `date`.
    pub fn containing(span: Span, date: NaiveDate) -> Self {
        match span {
            Span::Day => Self::day(date),
            Span::Week => {
                let offset = u64::from(date.weekday().num_days_from_monday());
                let first = date - Days::new(offset);
                Self::new(first, first + Days::new(6), span)
            }
            Span::Month => {
                let first = date.with_day(1).unwrap_or(date);
                let last = (first + Months::new(1)) - Days::new(1);
                Self::new(first, last, span)
            }
        }
    }

    fn new(first: NaiveDate, last: NaiveDate, span: Span) -> Self {
        Self {
            begin: local(first.and_time(NaiveTime::MIN)),
            end: local(last.and_hms_opt(23, 59, 59).unwrap_or(last.and_time(NaiveTime::MIN))),
            span,
        }
    }

    pub fn begin(&self) -> DateTime<Local> {
        self.begin
    }

    pub fn end(&self) -> DateTime<Local> {
        self.end
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// True when the period covers at most one day.
    pub fn is_single_day(&self) -> bool {
        self.begin.date_naive() == self.end.date_naive()
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            since: self.begin.timestamp(),
            to: self.end.timestamp(),
        }
    }
}

/// Resolves a local wall-clock time. Times that fall in a DST gap are read as UTC.
fn local(naive: chrono::NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}
