use crate::model::Money;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Ids that start with this prefix have not been confirmed by the server yet.
pub const PLACEHOLDER_PREFIX: &str = "_new:";

/// The last millisecond value handed out by `next_placeholder_id`.
static LAST_PLACEHOLDER: AtomicI64 = AtomicI64::new(0);

/// Returns a new placeholder id `_new:<millis>`. Ids are strictly increasing within the process,
/// so two expenses created in the same millisecond still get distinct ids.
fn next_placeholder_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_PLACEHOLDER.load(Ordering::SeqCst);
    loop {
        let candidate = now.max(last + 1);
        match LAST_PLACEHOLDER.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => return format!("{PLACEHOLDER_PREFIX}{candidate}"),
            Err(actual) => last = actual,
        }
    }
}

/// Where an expense is in its trip to the server.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Synchronized with the server, nothing pending.
    #[default]
    Ready,
    /// Added locally, create pending.
    Created,
    /// Changed locally, update pending.
    Edited,
    /// Marked for removal locally, delete pending.
    Deleted,
}

serde_plain::derive_display_from_serialize!(Lifecycle);
serde_plain::derive_fromstr_from_deserialize!(Lifecycle);

/// A single expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: String,
    user: String,
    amount: Money,
    date: DateTime<Utc>,
    description: Option<String>,
    category: Option<String>,
    lifecycle: Lifecycle,
}

impl Expense {
    /// Creates a new, not yet synchronized expense dated now. It carries a placeholder id and the
    /// `Created` lifecycle tag.
    pub fn new(user: impl Into<String>, amount: Money) -> Self {
        Self {
            id: next_placeholder_id(),
            user: user.into(),
            amount,
            date: Utc::now(),
            description: None,
            category: None,
            lifecycle: Lifecycle::Created,
        }
    }

    /// Builds a `Ready` expense from a server record. The category is the first entry of the
    /// record's category list, if any.
    pub fn from_remote(record: ExpenseRecord) -> Result<Self> {
        let date = DateTime::from_timestamp(record.date, 0)
            .with_context(|| format!("Expense {} has an invalid date {}", record.id, record.date))?;
        Ok(Self {
            id: record.id,
            user: record.user,
            amount: Money::from_cents(record.amount),
            date,
            description: non_empty(record.description),
            category: non_empty(record.categories.into_iter().next()),
            lifecycle: Lifecycle::Ready,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// False while the id is still a local placeholder.
    pub fn is_synchronized(&self) -> bool {
        !self.id.starts_with(PLACEHOLDER_PREFIX)
    }

    /// True when the server has confirmed the latest local state.
    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = user.into();
    }

    pub fn set_amount(&mut self, amount: Money) {
        self.amount = amount;
    }

    pub fn set_date(&mut self, date: DateTime<Utc>) {
        self.date = date;
    }

    /// Empty strings clear the description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = non_empty(description);
    }

    /// Empty strings clear the category.
    pub fn set_category(&mut self, category: Option<String>) {
        self.category = non_empty(category);
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.set_date(date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.set_description(Some(description.into()));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.set_category(Some(category.into()));
        self
    }

    pub fn mark_created(&mut self) {
        self.lifecycle = Lifecycle::Created;
    }

    pub fn mark_edited(&mut self) {
        self.lifecycle = Lifecycle::Edited;
    }

    pub fn mark_deleted(&mut self) {
        self.lifecycle = Lifecycle::Deleted;
    }

    pub fn mark_ready(&mut self) {
        self.lifecycle = Lifecycle::Ready;
    }

    /// Produces the variables for a create or update mutation. Optional fields are only present
    /// when they have a value and `id` only when `include_id` is set.
    pub fn to_request_vars(&self, include_id: bool) -> ExpenseVars {
        ExpenseVars {
            id: include_id.then(|| self.id.clone()),
            user: self.user.clone(),
            amount: self.amount.cents(),
            date: Some(self.date.timestamp()),
            description: self.description.clone(),
            category: self.category.clone().map(|c| vec![c]),
        }
    }

    /// The compact form kept in local storage: `{"i", "u", "a", "t", "d"?, "c"?}`.
    pub fn serialize(&self) -> Value {
        let persisted = PersistedExpense {
            i: self.id.clone(),
            u: self.user.clone(),
            a: self.amount.cents(),
            t: self.date.timestamp(),
            d: self.description.clone(),
            c: self.category.clone(),
        };
        // A struct of strings and integers always converts.
        serde_json::to_value(persisted).unwrap_or(Value::Null)
    }

    /// Reads the compact form. Returns `None` when `data` is not a valid persisted expense, e.g.
    /// when any of `i`, `u`, `a` or `t` is missing.
    ///
    /// The lifecycle is not persisted: placeholder ids come back as `Created`, everything else as
    /// `Edited` since it only exists in storage because of a pending change.
    pub fn deserialize(data: &Value) -> Option<Self> {
        let persisted = PersistedExpense::deserialize(data).ok()?;
        let date = DateTime::from_timestamp(persisted.t, 0)?;
        let lifecycle = if persisted.i.starts_with(PLACEHOLDER_PREFIX) {
            Lifecycle::Created
        } else {
            Lifecycle::Edited
        };
        Some(Self {
            id: persisted.i,
            user: persisted.u,
            amount: Money::from_cents(persisted.a),
            date,
            description: non_empty(persisted.d),
            category: non_empty(persisted.c),
            lifecycle,
        })
    }

    #[cfg(test)]
    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedExpense {
    i: String,
    u: String,
    a: i64,
    t: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<String>,
}

/// An expense as the server returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: String,
    pub user: String,
    /// Unix seconds.
    pub date: i64,
    /// Cents.
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Variables for the create and update mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseVars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
}

impl ExpenseVars {
    /// Checks the variables before they are sent. `require_id` is set for updates.
    pub fn validate(&self, require_id: bool) -> Result<()> {
        anyhow::ensure!(!self.user.is_empty(), "An expense must belong to a user");
        if require_id {
            match self.id.as_deref() {
                Some(id) if !id.is_empty() => {}
                _ => anyhow::bail!("Updating an expense requires its id"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Expense {
        Expense::new("Ann", Money::from_cents(1250))
            .with_date(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
            .with_description("lunch")
            .with_category("food")
    }

    #[test]
    fn test_new_expense_is_created_with_placeholder() {
        let e = sample();
        assert!(e.id().starts_with(PLACEHOLDER_PREFIX));
        assert!(!e.is_synchronized());
        assert_eq!(e.lifecycle(), Lifecycle::Created);
    }

    #[test]
    fn test_placeholder_ids_are_unique() {
        let ids: std::collections::HashSet<String> = (0..500)
            .map(|_| Expense::new("Ann", Money::ZERO).id().to_string())
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_round_trip() {
        let e = sample();
        let back = Expense::deserialize(&e.serialize()).unwrap();
        assert_eq!(back.id(), e.id());
        assert_eq!(back.user(), e.user());
        assert_eq!(back.amount().cents(), e.amount().cents());
        assert_eq!(back.date().timestamp(), e.date().timestamp());
        assert_eq!(back.description(), Some("lunch"));
        assert_eq!(back.category(), Some("food"));
    }

    #[test]
    fn test_round_trip_without_optionals() {
        let e = Expense::new("Bob", Money::from_cents(-3));
        let data = e.serialize();
        assert!(data.get("d").is_none());
        assert!(data.get("c").is_none());
        let back = Expense::deserialize(&data).unwrap();
        assert_eq!(back.description(), None);
        assert_eq!(back.category(), None);
        assert_eq!(back.date().timestamp(), e.date().timestamp());
    }

    #[test]
    fn test_serialize_uses_short_keys() {
        let data = sample().serialize();
        assert_eq!(data["u"], json!("Ann"));
        assert_eq!(data["a"], json!(1250));
        assert_eq!(data["t"], json!(1_700_000_000));
        assert_eq!(data["d"], json!("lunch"));
        assert_eq!(data["c"], json!("food"));
    }

    #[test]
    fn test_deserialize_invalid_returns_none() {
        assert!(Expense::deserialize(&json!({})).is_none());
        assert!(Expense::deserialize(&json!({"i": "x", "u": "Ann", "a": 1})).is_none());
        assert!(Expense::deserialize(&json!({"i": "x", "u": "Ann", "t": 1})).is_none());
        assert!(Expense::deserialize(&json!({"i": null, "u": "Ann", "a": 1, "t": 1})).is_none());
        assert!(Expense::deserialize(&json!("not an object")).is_none());
        assert!(Expense::deserialize(&Value::Null).is_none());
    }

    #[test]
    fn test_deserialize_lifecycle() {
        let created = Expense::deserialize(&json!({"i": "_new:1000", "u": "A", "a": 1, "t": 1}));
        assert_eq!(created.unwrap().lifecycle(), Lifecycle::Created);
        let edited = Expense::deserialize(&json!({"i": "srv-1", "u": "A", "a": 1, "t": 1}));
        assert_eq!(edited.unwrap().lifecycle(), Lifecycle::Edited);
    }

    #[test]
    fn test_from_remote() {
        let record = ExpenseRecord {
            id: "srv-9".to_string(),
            user: "Ann".to_string(),
            date: 1_700_000_000,
            amount: 999,
            description: Some(String::new()),
            categories: vec!["food".to_string(), "extra".to_string()],
        };
        let e = Expense::from_remote(record).unwrap();
        assert_eq!(e.id(), "srv-9");
        assert!(e.is_synchronized());
        assert!(e.is_ready());
        assert_eq!(e.category(), Some("food"));
        assert_eq!(e.description(), None);
        assert_eq!(e.amount().cents(), 999);
    }

    #[test]
    fn test_from_remote_without_categories() {
        let record = ExpenseRecord {
            id: "srv-1".to_string(),
            user: "Ann".to_string(),
            date: 0,
            amount: 1,
            ..Default::default()
        };
        assert_eq!(Expense::from_remote(record).unwrap().category(), None);
    }

    #[test]
    fn test_clone_preserves_id_and_lifecycle() {
        let mut e = sample();
        e.mark_edited();
        let mut copy = e.clone();
        assert_eq!(copy.id(), e.id());
        assert_eq!(copy.lifecycle(), Lifecycle::Edited);
        copy.set_amount(Money::from_cents(1));
        assert_eq!(e.amount().cents(), 1250);
    }

    #[test]
    fn test_request_vars() {
        let e = sample();
        let vars = e.to_request_vars(false);
        assert_eq!(vars.id, None);
        assert_eq!(vars.amount, 1250);
        assert_eq!(vars.category, Some(vec!["food".to_string()]));
        let json = serde_json::to_value(&vars).unwrap();
        assert!(json.get("id").is_none());

        let bare = Expense::new("Ann", Money::from_cents(5)).to_request_vars(true);
        assert_eq!(bare.id.as_deref().map(|id| id.starts_with(PLACEHOLDER_PREFIX)), Some(true));
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_vars_validation() {
        let vars = sample().to_request_vars(false);
        assert!(vars.validate(false).is_ok());
        assert!(vars.validate(true).is_err());
        assert!(sample().to_request_vars(true).validate(true).is_ok());
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Lifecycle::Deleted.to_string(), "deleted");
        assert_eq!("edited".parse::<Lifecycle>().unwrap(), Lifecycle::Edited);
    }
}
