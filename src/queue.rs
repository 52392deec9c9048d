//! The durable log of local changes that the server has not confirmed yet.
//!
//! The queue lives under a single storage key as a JSON array. Entries are stored newest first and
//! handed out oldest first. Each entry keeps its expense as raw JSON so that one unreadable entry
//! never hides the rest of the queue.

use crate::model::Expense;
use crate::storage::{self, Storage};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// The storage key that holds the queue.
pub const PENDING_KEY: &str = "$pending";

/// The kind of change waiting to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

serde_plain::derive_display_from_serialize!(OperationType);
serde_plain::derive_fromstr_from_deserialize!(OperationType);

/// One queued change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    #[serde(rename = "type")]
    kind: OperationType,
    /// Unix milliseconds at enqueue time.
    timestamp: i64,
    /// The expense in its persisted form.
    expense: Value,
}

impl PendingOperation {
    pub fn new(kind: OperationType, expense: &Expense) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
            expense: expense.serialize(),
        }
    }

    pub fn kind(&self) -> OperationType {
        self.kind
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The id of the queued expense, if the entry has one.
    pub fn expense_id(&self) -> Option<&str> {
        self.expense.get("i").and_then(Value::as_str)
    }

    /// The queued expense, or `None` when the stored form is unreadable.
    pub fn expense(&self) -> Option<Expense> {
        Expense::deserialize(&self.expense)
    }

    fn same_entry(&self, other: &PendingOperation) -> bool {
        self.kind == other.kind
            && self.timestamp == other.timestamp
            && self.expense_id() == other.expense_id()
    }

    #[cfg(test)]
    pub(crate) fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[cfg(test)]
    pub(crate) fn raw(kind: OperationType, timestamp: i64, expense: Value) -> Self {
        Self {
            kind,
            timestamp,
            expense,
        }
    }
}

/// The pending-operation queue over a `Storage`.
pub struct PendingQueue {
    storage: Arc<dyn Storage>,
    // Makes each read-modify-write of the stored array atomic within this process.
    lock: Mutex<()>,
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").finish_non_exhaustive()
    }
}

impl PendingQueue {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    /// Appends a change for `expense` and persists the queue. Returns `false`, leaving the queue
    /// as it was, when the expense already has an entry.
    pub fn enqueue(&self, expense: &Expense, kind: OperationType) -> Result<bool> {
        self.push(PendingOperation::new(kind, expense))
    }

    pub(crate) fn push(&self, op: PendingOperation) -> Result<bool> {
        let _guard = storage::lock(&self.lock)?;
        let mut ops = self.read()?;
        let id = op.expense_id().unwrap_or_default();
        if ops.iter().any(|o| o.expense_id() == Some(id)) {
            debug!("Expense {id} is already queued, dropping the {} request", op.kind);
            return Ok(false);
        }
        trace!("Queueing {} of expense {id}", op.kind);
        ops.push(op);
        self.write(ops)?;
        Ok(true)
    }

    /// All queued changes, oldest first.
    pub fn load_all(&self) -> Result<Vec<PendingOperation>> {
        let _guard = storage::lock(&self.lock)?;
        self.read()
    }

    /// Replaces the whole queue.
    pub fn save_all(&self, ops: Vec<PendingOperation>) -> Result<()> {
        let _guard = storage::lock(&self.lock)?;
        self.write(ops)
    }

    /// Removes `op` from the stored queue. Entries added since `op` was loaded are kept.
    pub fn remove(&self, op: &PendingOperation) -> Result<()> {
        let _guard = storage::lock(&self.lock)?;
        let mut ops = self.read()?;
        let before = ops.len();
        ops.retain(|o| !o.same_entry(op));
        if ops.len() != before {
            self.write(ops)?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether expense `id` has a queued change.
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self
            .load_all()?
            .iter()
            .any(|o| o.expense_id() == Some(id)))
    }

    fn read(&self) -> Result<Vec<PendingOperation>> {
        let Some(data) = self.storage.get(PENDING_KEY)? else {
            return Ok(Vec::new());
        };
        let value: Value = match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                warn!("The pending queue is not valid JSON, treating it as empty: {e}");
                return Ok(Vec::new());
            }
        };
        let Value::Array(items) = value else {
            warn!("The pending queue is not a JSON array, treating it as empty");
            return Ok(Vec::new());
        };
        let mut ops: Vec<PendingOperation> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(op) => Some(op),
                Err(e) => {
                    warn!("Dropping an unreadable pending operation: {e}");
                    None
                }
            })
            .collect();
        ops.sort_by_key(PendingOperation::timestamp);
        Ok(ops)
    }

    fn write(&self, mut ops: Vec<PendingOperation>) -> Result<()> {
        if ops.is_empty() {
            return self.storage.remove(PENDING_KEY);
        }
        ops.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let data = serde_json::to_string(&ops).context("Unable to serialize the pending queue")?;
        self.storage.set(PENDING_KEY, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Money;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn queue() -> (Arc<MemoryStorage>, PendingQueue) {
        let storage = Arc::new(MemoryStorage::new());
        let queue = PendingQueue::new(storage.clone());
        (storage, queue)
    }

    fn expense(id: &str) -> Expense {
        let mut e = Expense::new("Ann", Money::from_cents(100));
        e.set_id(id);
        e
    }

    #[test]
    fn test_enqueue_is_unique_per_expense() {
        let (_, queue) = queue();
        let e = expense("_new:1");
        assert!(queue.enqueue(&e, OperationType::Create).unwrap());
        assert!(!queue.enqueue(&e, OperationType::Create).unwrap());
        assert!(!queue.enqueue(&e, OperationType::Update).unwrap());
        let ops = queue.load_all().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), OperationType::Create);
        assert!(queue.contains("_new:1").unwrap());
        assert!(!queue.contains("_new:2").unwrap());
    }

    #[test]
    fn test_storage_order() {
        let (storage, queue) = queue();
        let a = PendingOperation::new(OperationType::Create, &expense("a")).with_timestamp(10);
        let b = PendingOperation::new(OperationType::Update, &expense("b")).with_timestamp(30);
        let c = PendingOperation::new(OperationType::Delete, &expense("c")).with_timestamp(20);
        queue.save_all(vec![a, b, c]).unwrap();

        let stored: Vec<Value> =
            serde_json::from_str(&storage.get(PENDING_KEY).unwrap().unwrap()).unwrap();
        let stamps: Vec<i64> = stored
            .iter()
            .map(|v| v["timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(stamps, vec![30, 20, 10]);
        assert_eq!(stored[0]["type"], "update");

        let loaded: Vec<i64> = queue
            .load_all()
            .unwrap()
            .iter()
            .map(PendingOperation::timestamp)
            .collect();
        assert_eq!(loaded, vec![10, 20, 30]);
    }

    #[test]
    fn test_empty_queue_removes_key() {
        let (storage, queue) = queue();
        queue.enqueue(&expense("a"), OperationType::Create).unwrap();
        assert!(storage.get(PENDING_KEY).unwrap().is_some());
        let op = queue.load_all().unwrap().remove(0);
        queue.remove(&op).unwrap();
        assert!(storage.get(PENDING_KEY).unwrap().is_none());
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_remove_keeps_other_entries() {
        let (_, queue) = queue();
        queue.enqueue(&expense("a"), OperationType::Create).unwrap();
        let first = queue.load_all().unwrap().remove(0);
        queue.enqueue(&expense("b"), OperationType::Update).unwrap();
        queue.remove(&first).unwrap();
        let rest = queue.load_all().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].expense_id(), Some("b"));
    }

    #[test]
    fn test_not_an_array() {
        let (storage, queue) = queue();
        storage.set(PENDING_KEY, r#"{"a": 1}"#).unwrap();
        assert!(queue.load_all().unwrap().is_empty());
        storage.set(PENDING_KEY, "garbage").unwrap();
        assert!(queue.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entries() {
        let (storage, queue) = queue();
        let data = json!([
            {"type": "create", "timestamp": 5, "expense": {"i": "x"}},
            {"type": "explode", "timestamp": 6, "expense": {}},
            42,
        ]);
        storage.set(PENDING_KEY, &data.to_string()).unwrap();
        let ops = queue.load_all().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].expense_id(), Some("x"));
        // The entry itself loads but its expense does not.
        assert!(ops[0].expense().is_none());
    }

    #[test]
    fn test_round_trip_expense() {
        let (_, queue) = queue();
        let e = expense("srv-9").with_description("lunch").with_category("food");
        queue.enqueue(&e, OperationType::Update).unwrap();
        let op = queue.load_all().unwrap().remove(0);
        let back = op.expense().unwrap();
        assert_eq!(back.id(), "srv-9");
        assert_eq!(back.description(), Some("lunch"));
        assert_eq!(back.category(), Some("food"));
        assert_eq!(op.kind().to_string(), "update");
    }

    #[test]
    fn test_raw_entry() {
        let op = PendingOperation::raw(OperationType::Delete, 1, json!({}));
        assert_eq!(op.expense_id(), None);
        assert!(op.expense().is_none());
    }
}
