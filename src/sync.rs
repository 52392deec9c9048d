//! Replays the pending-operation queue against the server.
//!
//! A drain takes the oldest queued operation, sends it, and on success removes it from the queue
//! and folds the server's answer into the expense list. The first failure stops the drain and
//! leaves the failed operation at the head of the queue. Only one drain runs at a time; a request
//! that finds a drain running makes that drain go over the queue once more before it returns.

use crate::api::Remote;
use crate::model::{Expense, ExpenseRecord};
use crate::queue::{OperationType, PendingOperation, PendingQueue};
use crate::store::ExpenseList;
use crate::{Error, Result};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// How a drain ended.
#[derive(Debug, Clone)]
pub enum DrainOutcome {
    /// Another drain was already running. Nothing was done.
    Busy,
    /// The queue is empty.
    Drained { processed: usize },
    /// An operation failed and is still queued.
    Halted {
        processed: usize,
        error: Arc<Error>,
    },
}

impl DrainOutcome {
    pub fn processed(&self) -> usize {
        match self {
            DrainOutcome::Busy => 0,
            DrainOutcome::Drained { processed } | DrainOutcome::Halted { processed, .. } => {
                *processed
            }
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(self, DrainOutcome::Drained { .. })
    }
}

/// Backoff for the automatic retries that follow a failed background drain. The delay before
/// retry `n` is `min(initial_delay_ms * 2^(n-1), max_delay_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive retries before giving up. Zero disables retrying.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 300_000,
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// The wait before retry `attempt` (1-based), or `None` once the attempts are used up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Some(Duration::from_millis(ms))
    }
}

/// Drains the pending queue.
pub struct SyncEngine {
    queue: Arc<PendingQueue>,
    remote: Arc<dyn Remote>,
    expenses: ExpenseList,
    guard: Mutex<()>,
    timeout: Duration,
    retry: RetryPolicy,
    failures: AtomicU32,
    retry_pending: AtomicBool,
    // Set by every drain request, cleared by the drain that holds the guard.
    rerun: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        queue: Arc<PendingQueue>,
        remote: Arc<dyn Remote>,
        expenses: ExpenseList,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            remote,
            expenses,
            guard: Mutex::new(()),
            timeout,
            retry,
            failures: AtomicU32::new(0),
            retry_pending: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Sends queued operations, oldest first, until the queue is empty or one fails. Returns
    /// `Busy` straight away when another drain is running; that drain then reads the queue again
    /// before it returns, so work queued in the meantime is not left behind.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        self.rerun.store(true, Ordering::SeqCst);
        let mut processed = 0;
        loop {
            let Ok(guard) = self.guard.try_lock() else {
                debug!("A drain is already running");
                if processed == 0 {
                    return Ok(DrainOutcome::Busy);
                }
                // The holder sees `rerun` when it unlocks.
                return Ok(DrainOutcome::Drained { processed });
            };
            self.rerun.store(false, Ordering::SeqCst);
            let (sent, failure) = self.drain_locked().await?;
            drop(guard);
            processed += sent;

            if let Some(error) = failure {
                return Ok(DrainOutcome::Halted {
                    processed,
                    error: Arc::new(error),
                });
            }
            if !self.rerun.load(Ordering::SeqCst) {
                break;
            }
            trace!("Another drain was requested meanwhile, reading the queue again");
        }

        self.failures.store(0, Ordering::SeqCst);
        if processed > 0 {
            info!("Sent {processed} pending change(s)");
        }
        Ok(DrainOutcome::Drained { processed })
    }

    /// One pass over the queue with the guard held. Returns the number of operations sent and the
    /// error that stopped the pass, if any.
    async fn drain_locked(&self) -> Result<(usize, Option<Error>)> {
        let mut processed = 0;
        loop {
            let Some(op) = self.queue.load_all()?.into_iter().next() else {
                return Ok((processed, None));
            };
            let Some(expense) = op.expense() else {
                warn!(
                    "Dropping a pending {} with an unreadable expense: {:?}",
                    op.kind(),
                    op.expense_id()
                );
                self.queue.remove(&op)?;
                continue;
            };

            match self.send(op.kind(), &expense).await {
                Ok(record) => {
                    self.queue.remove(&op)?;
                    self.reconcile(&op, &expense, record);
                    processed += 1;
                }
                Err(e) => {
                    warn!(
                        "Unable to {} expense {}, it stays queued: {e:#}",
                        op.kind(),
                        expense.id()
                    );
                    return Ok((processed, Some(e)));
                }
            }
        }
    }

    /// Waits for a running drain to finish.
    pub async fn idle(&self) {
        let _guard = self.guard.lock().await;
    }

    /// Starts a drain on the current Tokio runtime and returns without waiting for it. A failed
    /// drain is retried according to the `RetryPolicy`. Without a runtime this does nothing and
    /// the queue waits for the next request.
    pub fn request_drain(self: &Arc<Self>) {
        let Ok(handle) = Handle::try_current() else {
            debug!("No async runtime, the pending queue will be sent later");
            return;
        };
        let engine = Arc::clone(self);
        handle.spawn(engine.drain_in_background());
    }

    async fn drain_in_background(self: Arc<Self>) {
        loop {
            match self.drain().await {
                Ok(DrainOutcome::Halted { .. }) => {}
                Ok(_) => return,
                Err(e) => {
                    warn!("Unable to read the pending queue: {e:#}");
                    return;
                }
            }
            if self.retry_pending.swap(true, Ordering::SeqCst) {
                trace!("A retry is already scheduled");
                return;
            }
            let attempt = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
            let Some(delay) = self.retry.delay(attempt) else {
                if self.retry.max_attempts > 0 {
                    warn!(
                        "Giving up after {} retries, pending changes will be sent on the next \
                        request",
                        self.retry.max_attempts
                    );
                }
                self.failures.store(0, Ordering::SeqCst);
                self.retry_pending.store(false, Ordering::SeqCst);
                return;
            };
            debug!("Retrying the pending queue in {delay:?} (attempt {attempt})");
            tokio::time::sleep(delay).await;
            self.retry_pending.store(false, Ordering::SeqCst);
        }
    }

    async fn send(&self, kind: OperationType, expense: &Expense) -> Result<ExpenseRecord> {
        tokio::time::timeout(self.timeout, self.dispatch(kind, expense))
            .await
            .map_err(|_| anyhow!("{kind} of expense {} timed out", expense.id()))?
    }

    async fn dispatch(&self, kind: OperationType, expense: &Expense) -> Result<ExpenseRecord> {
        trace!("Sending {kind} of expense {}", expense.id());
        match kind {
            OperationType::Create => {
                let vars = expense.to_request_vars(false);
                vars.validate(false)?;
                self.remote.create_expense(&vars).await
            }
            OperationType::Update => {
                let vars = expense.to_request_vars(true);
                vars.validate(true)?;
                self.remote.update_expense(&vars).await
            }
            OperationType::Delete => self.remote.delete_expense(expense.id()).await,
        }
    }

    /// Folds a confirmed operation into the list. The list may show another period or still be
    /// loading, in which case there is nothing to fold into.
    fn reconcile(&self, op: &PendingOperation, sent: &Expense, record: ExpenseRecord) {
        let result = match op.kind() {
            OperationType::Create | OperationType::Update => Expense::from_remote(record)
                .and_then(|confirmed| self.expenses.replace(sent.id(), confirmed)),
            OperationType::Delete => self.expenses.remove(sent.id()).map(|e| e.is_some()),
        };
        match result {
            Ok(true) => trace!("Confirmed {} of expense {}", op.kind(), sent.id()),
            Ok(false) => trace!("Expense {} is not in the current list", sent.id()),
            Err(e) => debug!("Not updating the list for expense {}: {e:#}", sent.id()),
        }
    }
}
