//! Implements `Remote` in memory.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an expense server. Tests also use it to simulate an unreachable
//! server and to hold calls in flight.

use crate::api::Remote;
use crate::model::{ExpenseRecord, ExpenseVars};
use crate::period::DateRange;
use crate::storage::lock;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;
use tracing::trace;

/// An in-memory expense server.
#[derive(Debug)]
pub struct TestRemote {
    state: Mutex<State>,
    offline: AtomicBool,
    calls: AtomicUsize,
    paused: AtomicBool,
    gate: Semaphore,
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, ExpenseRecord>,
    /// Ids handed to the next creates, before falling back to `srv-N`.
    queued_ids: VecDeque<String>,
    next_id: u64,
}

impl TestRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// The next creates will return these ids, in order.
    pub fn queue_ids<I, S>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)?
            .queued_ids
            .extend(ids.into_iter().map(Into::into));
        Ok(())
    }

    /// While offline every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The number of calls received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Holds every following call until `release` lets it through.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Lets `n` held calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Stores `record` as if it had been created earlier.
    pub fn insert(&self, record: ExpenseRecord) -> Result<()> {
        lock(&self.state)?.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn record(&self, id: &str) -> Result<Option<ExpenseRecord>> {
        Ok(lock(&self.state)?.records.get(id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.state)?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    async fn enter(&self, operation: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace!("TestRemote received {operation}");
        if self.paused.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .context("The test server gate was closed")?
                .forget();
        }
        if self.offline.load(Ordering::SeqCst) {
            bail!("{operation} failed: the server is unreachable");
        }
        Ok(())
    }
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn to_record(id: String, vars: &ExpenseVars) -> ExpenseRecord {
    ExpenseRecord {
        id,
        user: vars.user.clone(),
        date: vars.date.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        amount: vars.amount,
        description: vars.description.clone(),
        categories: vars.category.clone().unwrap_or_default(),
    }
}

#[async_trait::async_trait]
impl Remote for TestRemote {
    async fn create_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord> {
        self.enter("CreateExpense").await?;
        vars.validate(false)?;
        let mut state = lock(&self.state)?;
        let id = match state.queued_ids.pop_front() {
            Some(id) => id,
            None => {
                state.next_id += 1;
                format!("srv-{}", state.next_id)
            }
        };
        let record = to_record(id, vars);
        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord> {
        self.enter("UpdateExpense").await?;
        vars.validate(true)?;
        let id = vars.id.clone().unwrap_or_default();
        let mut state = lock(&self.state)?;
        if !state.records.contains_key(&id) {
            bail!("UpdateExpense failed: expense {id} does not exist");
        }
        let record = to_record(id, vars);
        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete_expense(&self, id: &str) -> Result<ExpenseRecord> {
        self.enter("DeleteExpense").await?;
        lock(&self.state)?
            .records
            .remove(id)
            .with_context(|| format!("DeleteExpense failed: expense {id} does not exist"))
    }

    async fn fetch_expenses(&self, range: &DateRange) -> Result<Vec<ExpenseRecord>> {
        self.enter("GetExpensesInRange").await?;
        Ok(lock(&self.state)?
            .records
            .values()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect())
    }
}
