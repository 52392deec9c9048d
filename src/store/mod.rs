//! The application store: who is signed in, which period is shown, the expense list for it, and
//! the queue of local changes on their way to the server.
//!
//! `Store` is cheap to clone and every clone shares the same state. Observers subscribe to the
//! user, the period or the expense list and are notified once per change.

mod list;

pub use list::ExpenseList;

use crate::api::{self, Mode, Remote};
use crate::loadable::Loadable;
use crate::model::{Categories, Category, Expense, ExpenseRecord, Lifecycle, User, Users};
use crate::period::{Span, TimePeriod};
use crate::queue::{OperationType, PendingOperation, PendingQueue};
use crate::storage::{FileStorage, Storage};
use crate::sync::{DrainOutcome, RetryPolicy, SyncEngine};
use crate::{Config, Result};
use anyhow::{anyhow, bail, ensure, Context};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// The storage key of the remembered login.
pub const USER_KEY: &str = "$user";

/// How long a remembered login stays valid.
const LOGIN_TTL_DAYS: i64 = 30;

/// Everything a `Store` is built from.
pub struct StoreParts {
    pub storage: Arc<dyn Storage>,
    pub remote: Arc<dyn Remote>,
    pub users: Users,
    pub categories: Categories,
    /// Bounds every server call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn Storage>,
    remote: Arc<dyn Remote>,
    users: Users,
    categories: Categories,
    request_timeout: Duration,
    user: watch::Sender<Option<User>>,
    period: watch::Sender<Option<TimePeriod>>,
    expenses: ExpenseList,
    queue: Arc<PendingQueue>,
    engine: Arc<SyncEngine>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("user", &self.user().map(|u| u.name().to_string()))
            .field("period", &self.period())
            .field("expenses", &self.inner.expenses.snapshot().state_name())
            .finish_non_exhaustive()
    }
}

/// The remembered login: `{"n": user name, "t": unix seconds}`.
#[derive(Debug, Serialize, Deserialize)]
struct LoginToken {
    n: String,
    t: i64,
}

impl Store {
    pub fn new(parts: StoreParts) -> Self {
        let queue = Arc::new(PendingQueue::new(parts.storage.clone()));
        let expenses = ExpenseList::new();
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            parts.remote.clone(),
            expenses.clone(),
            parts.request_timeout,
            parts.retry,
        ));
        let (user, _) = watch::channel(None);
        let (period, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                storage: parts.storage,
                remote: parts.remote,
                users: parts.users,
                categories: parts.categories,
                request_timeout: parts.request_timeout,
                user,
                period,
                expenses,
                queue,
                engine,
            }),
        }
    }

    /// Builds a store over `$EXPENSES_HOME/storage.json` and the remote selected by `mode`.
    pub fn from_config(config: &Config, mode: Mode) -> Result<Self> {
        Ok(Self::new(StoreParts {
            storage: Arc::new(FileStorage::new(config.storage_path())),
            remote: api::remote(config, mode)?,
            users: config.users().clone(),
            categories: config.categories().clone(),
            request_timeout: config.request_timeout(),
            retry: config.retry(),
        }))
    }

    // -----------------------
    // Observable state
    // -----------------------

    pub fn user(&self) -> Option<User> {
        self.inner.user.borrow().clone()
    }

    pub fn period(&self) -> Option<TimePeriod> {
        *self.inner.period.borrow()
    }

    pub fn expenses(&self) -> Loadable<Vec<Expense>> {
        self.inner.expenses.snapshot()
    }

    pub fn subscribe_user(&self) -> watch::Receiver<Option<User>> {
        self.inner.user.subscribe()
    }

    pub fn subscribe_period(&self) -> watch::Receiver<Option<TimePeriod>> {
        self.inner.period.subscribe()
    }

    pub fn subscribe_expenses(&self) -> watch::Receiver<Loadable<Vec<Expense>>> {
        self.inner.expenses.subscribe()
    }

    pub fn users(&self) -> &Users {
        &self.inner.users
    }

    pub fn categories(&self) -> &Categories {
        &self.inner.categories
    }

    /// Looks a category up by name, ignoring case.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.inner.categories.find(name)
    }

    // -----------------------
    // Session
    // -----------------------

    /// Switches the signed in user. The expense list is reset, the login is remembered (or
    /// forgotten when `user` is `None`), and today's expenses are fetched for a new user. A failed
    /// fetch leaves the list in its error state but does not fail the switch.
    pub async fn set_user(&self, user: Option<User>) -> Result<()> {
        debug!(
            "Setting the user to {:?}",
            user.as_ref().map(|u| u.name().to_string())
        );
        let signed_in = user.is_some();
        self.inner.user.send_replace(user);
        self.reset();
        self.remember_user()?;
        if signed_in {
            if let Err(e) = self.fetch_today_expenses().await {
                warn!("Unable to load today's expenses: {e:#}");
            }
        }
        Ok(())
    }

    /// Restores a remembered login. Expired, unreadable or unknown logins are forgotten.
    pub async fn load_user(&self) -> Result<Option<User>> {
        let Some(data) = self.inner.storage.get(USER_KEY)? else {
            return Ok(None);
        };
        match self.read_login(&data) {
            Ok(user) => {
                trace!("Restoring the login of {}", user.name());
                self.set_user(Some(user.clone())).await?;
                Ok(Some(user))
            }
            Err(e) => {
                debug!("Forgetting the remembered login: {e:#}");
                self.inner.storage.remove(USER_KEY)?;
                Ok(None)
            }
        }
    }

    /// Signs in with a name (case-insensitive) and password (exact).
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<User> {
        if username.is_empty() || password.is_empty() {
            bail!("Missing username/password");
        }
        let user = self
            .inner
            .users
            .authenticate(username, password)
            .cloned()
            .context("Unauthorised")?;
        info!("Signed in as {}", user.name());
        self.set_user(Some(user.clone())).await?;
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.set_user(None).await
    }

    fn read_login(&self, data: &str) -> Result<User> {
        let token: LoginToken =
            serde_json::from_str(data).context("The remembered login is unreadable")?;
        let age = Utc::now().timestamp() - token.t;
        ensure!(
            age <= chrono::Duration::days(LOGIN_TTL_DAYS).num_seconds(),
            "Token expired"
        );
        self.inner
            .users
            .find(&token.n)
            .cloned()
            .with_context(|| format!("Unknown user '{}'", token.n))
    }

    fn remember_user(&self) -> Result<()> {
        self.inner.storage.remove(USER_KEY)?;
        if let Some(user) = self.user() {
            let token = LoginToken {
                n: user.name().to_string(),
                t: Utc::now().timestamp(),
            };
            let data = serde_json::to_string(&token).context("Unable to serialize the login")?;
            self.inner.storage.set(USER_KEY, &data)?;
        }
        Ok(())
    }

    fn reset(&self) {
        self.inner.expenses.set(Loadable::empty());
    }

    // -----------------------
    // Expenses
    // -----------------------

    /// Publishes `expenses`. Available lists are sorted newest first.
    pub fn set_expenses(&self, expenses: Loadable<Vec<Expense>>) {
        self.inner.expenses.set(expenses);
    }

    /// Shows `period`. Returns `false`, changing nothing, when it is already shown. Otherwise the
    /// expense list is reset.
    pub fn set_period(&self, period: TimePeriod) -> bool {
        if self.period() == Some(period) {
            return false;
        }
        self.inner.period.send_replace(Some(period));
        self.reset();
        true
    }

    /// Adds a new expense for the signed in user. It appears in the list straight away, tagged
    /// `Created`, and its creation is queued for the server.
    pub fn add_expense(&self, mut expense: Expense) -> Result<Expense> {
        let user = self
            .user()
            .context("Unable to add an expense without a signed in user")?;
        ensure!(
            self.inner.expenses.is_available(),
            "Unable to add an expense while the expense list is not available"
        );
        expense.set_user(user.name());
        expense.mark_created();
        self.inner.expenses.insert(expense.clone())?;
        self.inner.queue.enqueue(&expense, OperationType::Create)?;
        self.request_sync();
        Ok(expense)
    }

    /// Replaces an expense in the list with `expense`, tagged `Edited`, and queues the update.
    pub fn update_expense(&self, mut expense: Expense) -> Result<Expense> {
        ensure!(
            self.inner.expenses.is_available(),
            "Unable to update an expense while the expense list is not available"
        );
        expense.mark_edited();
        let id = expense.id().to_string();
        if !self.inner.expenses.replace(&id, expense.clone())? {
            bail!("Expense {id} is not in the current list");
        }
        self.enqueue(&expense, OperationType::Update)?;
        self.request_sync();
        Ok(expense)
    }

    /// Tags expense `id` as `Deleted` and queues its removal. It leaves the list once the server
    /// confirms.
    pub fn delete_expense(&self, id: &str) -> Result<Expense> {
        ensure!(
            self.inner.expenses.is_available(),
            "Unable to delete an expense while the expense list is not available"
        );
        let expense = self
            .inner
            .expenses
            .update(id, Expense::mark_deleted)?
            .with_context(|| format!("Expense {id} is not in the current list"))?;
        self.enqueue(&expense, OperationType::Delete)?;
        self.request_sync();
        Ok(expense)
    }

    fn enqueue(&self, expense: &Expense, kind: OperationType) -> Result<()> {
        if !self.inner.queue.enqueue(expense, kind)? {
            warn!(
                "Expense {} already has a pending change, this {kind} will not be sent",
                expense.id()
            );
        }
        Ok(())
    }

    // -----------------------
    // Fetching
    // -----------------------

    pub async fn fetch_today_expenses(&self) -> Result<Vec<Expense>> {
        self.fetch_period_expenses(TimePeriod::today()).await
    }

    pub async fn fetch_week_expenses(&self) -> Result<Vec<Expense>> {
        self.fetch_period_expenses(TimePeriod::this_week()).await
    }

    pub async fn fetch_month_expenses(&self) -> Result<Vec<Expense>> {
        self.fetch_period_expenses(TimePeriod::this_month()).await
    }

    pub async fn fetch_day_expenses(&self, date: NaiveDate) -> Result<Vec<Expense>> {
        self.fetch_period_expenses(TimePeriod::containing(Span::Day, date))
            .await
    }

    /// Shows `period` and fetches its expenses. The list is `Loading` while the request is in
    /// flight, then `Available` or `Error`. Changes still waiting in the queue are laid over the
    /// server's answer. When the period changes during the request the answer is discarded.
    pub async fn fetch_period_expenses(&self, period: TimePeriod) -> Result<Vec<Expense>> {
        self.set_period(period);
        self.inner.expenses.set(Loadable::loading(None));

        let range = period.range();
        let result = match tokio::time::timeout(
            self.inner.request_timeout,
            self.inner.remote.fetch_expenses(&range),
        )
        .await
        {
            Ok(records) => records.and_then(|r| self.merge_pending(period, r)),
            Err(_) => Err(anyhow!("Fetching expenses timed out")),
        };

        if self.period() != Some(period) {
            debug!("The period changed during the fetch, discarding the response");
            return result;
        }
        match result {
            Ok(expenses) => {
                self.inner
                    .expenses
                    .set(Loadable::available(expenses.clone()));
                Ok(expenses)
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.inner.expenses.set(Loadable::error(e));
                Err(anyhow!(message))
            }
        }
    }

    /// Shows `period` with only the locally queued changes, for when the server cannot be reached.
    pub fn work_offline(&self, period: TimePeriod) -> Result<Vec<Expense>> {
        self.set_period(period);
        let expenses = self.merge_pending(period, Vec::new())?;
        self.inner
            .expenses
            .set(Loadable::available(expenses.clone()));
        Ok(expenses)
    }

    fn merge_pending(
        &self,
        period: TimePeriod,
        records: Vec<ExpenseRecord>,
    ) -> Result<Vec<Expense>> {
        let mut expenses: Vec<Expense> = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                Expense::from_remote(record)
                    .map_err(|e| warn!("Skipping expense {id} from the server: {e:#}"))
                    .ok()
            })
            .collect();
        let range = period.range();
        for op in self.inner.queue.load_all()? {
            let Some(mut pending) = op.expense() else {
                continue;
            };
            let existing = expenses.iter().position(|e| e.id() == pending.id());
            if existing.is_none() && !range.contains(pending.date().timestamp()) {
                continue;
            }
            match op.kind() {
                OperationType::Create => {}
                OperationType::Update => pending.mark_edited(),
                OperationType::Delete => pending.mark_deleted(),
            }
            match existing {
                Some(index) => expenses[index] = pending,
                None => expenses.push(pending),
            }
        }
        Ok(expenses)
    }

    // -----------------------
    // Synchronization
    // -----------------------

    /// Starts sending queued changes in the background.
    pub fn request_sync(&self) {
        self.inner.engine.request_drain();
    }

    /// Sends queued changes and waits for the result. A drain already running is waited for first.
    pub async fn sync_pending(&self) -> Result<DrainOutcome> {
        self.inner.engine.idle().await;
        self.inner.engine.drain().await
    }

    /// The queued changes, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingOperation>> {
        self.inner.queue.load_all()
    }

    /// Expenses in the list that still wait for the server.
    pub fn unsynchronized(&self) -> Vec<Expense> {
        self.expenses()
            .into_value()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.lifecycle() != Lifecycle::Ready)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Money;
    use crate::queue::PENDING_KEY;
    use crate::test::{TestEnv, ANN_PASSWORD};

    fn record(id: &str, cents: i64) -> ExpenseRecord {
        ExpenseRecord {
            id: id.into(),
            user: "Ann".into(),
            date: Utc::now().timestamp(),
            amount: cents,
            description: Some("lunch".into()),
            categories: vec!["food".into()],
        }
    }

    #[tokio::test]
    async fn test_sign_in_errors() {
        let env = TestEnv::new();
        let err = env.store.sign_in("", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing username/password");
        let err = env.store.sign_in("ann", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing username/password");
        let err = env.store.sign_in("ann", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorised");
        assert!(env.store.user().is_none());
        assert!(env.storage.get(USER_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_remembers_user() {
        let env = TestEnv::new();
        let user = env.store.sign_in("ANN", ANN_PASSWORD).await.unwrap();
        assert_eq!(user.name(), "Ann");
        assert_eq!(env.store.user().unwrap().name(), "Ann");
        assert_eq!(env.store.period(), Some(TimePeriod::today()));
        assert!(env.store.expenses().is_available());

        let token: serde_json::Value =
            serde_json::from_str(&env.storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(token["n"], "Ann");
        assert!((Utc::now().timestamp() - token["t"].as_i64().unwrap()).abs() < 60);

        // A restart picks the login back up.
        let restarted = TestEnv::with_storage(env.storage.clone());
        let restored = restarted.store.load_user().await.unwrap().unwrap();
        assert_eq!(restored.name(), "Ann");
        assert!(restarted.store.expenses().is_available());
    }

    #[tokio::test]
    async fn test_load_user_forgets_bad_tokens() {
        let env = TestEnv::new();
        assert!(env.store.load_user().await.unwrap().is_none());

        let expired = Utc::now().timestamp() - 31 * 24 * 60 * 60;
        for data in [
            format!(r#"{{"n":"Ann","t":{expired}}}"#),
            r#"{"n":"Zed","t":0}"#.to_string(),
            "nonsense".to_string(),
        ] {
            env.storage.set(USER_KEY, &data).unwrap();
            assert!(env.store.load_user().await.unwrap().is_none());
            assert!(env.storage.get(USER_KEY).unwrap().is_none());
            assert!(env.store.user().is_none());
        }

        let fresh = Utc::now().timestamp() - 29 * 24 * 60 * 60;
        env.storage
            .set(USER_KEY, &format!(r#"{{"n":"Bob","t":{fresh}}}"#))
            .unwrap();
        assert_eq!(
            env.store.load_user().await.unwrap().unwrap().name(),
            "Bob"
        );
    }

    #[tokio::test]
    async fn test_sign_out() {
        let env = TestEnv::signed_in().await;
        env.store.sign_out().await.unwrap();
        assert!(env.store.user().is_none());
        assert!(env.store.expenses().is_empty());
        assert!(env.storage.get(USER_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_expense_end_to_end() {
        let env = TestEnv::signed_in().await;
        env.remote.queue_ids(["X"]).unwrap();
        let mut rx = env.store.subscribe_expenses();
        rx.borrow_and_update();

        let expense = Expense::new("someone else", Money::from_cents(1250)).with_category("food");
        let added = env.store.add_expense(expense).unwrap();
        assert_eq!(added.user(), "Ann");
        assert!(!added.is_synchronized());
        assert!(rx.has_changed().unwrap());

        let list = env.store.expenses().into_value().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].lifecycle(), Lifecycle::Created);
        let pending = env.store.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind(), OperationType::Create);
        assert_eq!(pending[0].expense_id(), Some(added.id()));

        env.store.sync_pending().await.unwrap();

        let list = env.store.expenses().into_value().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id(), "X");
        assert_eq!(list[0].lifecycle(), Lifecycle::Ready);
        assert!(env.store.pending().unwrap().is_empty());
        assert!(env.storage.get(PENDING_KEY).unwrap().is_none());
        assert!(env.store.unsynchronized().is_empty());
    }

    #[tokio::test]
    async fn test_add_expense_tags_created() {
        let env = TestEnv::signed_in().await;
        env.store.set_expenses(Loadable::available(Vec::new()));
        let confirmed = Expense::from_remote(record("srv-9", 700)).unwrap();
        assert_eq!(confirmed.lifecycle(), Lifecycle::Ready);

        let added = env.store.add_expense(confirmed).unwrap();
        assert_eq!(added.lifecycle(), Lifecycle::Created);
        let list = env.store.expenses().into_value().unwrap();
        assert_eq!(list[0].lifecycle(), Lifecycle::Created);
        assert_eq!(env.store.unsynchronized().len(), 1);
    }

    #[tokio::test]
    async fn test_add_expense_preconditions() {
        let env = TestEnv::new();
        env.store.set_expenses(Loadable::available(Vec::new()));
        let err = env
            .store
            .add_expense(Expense::new("Ann", Money::from_cents(1)))
            .unwrap_err();
        assert!(err.to_string().contains("signed in"));

        let env = TestEnv::signed_in().await;
        env.store.set_expenses(Loadable::loading(None));
        assert!(env
            .store
            .add_expense(Expense::new("Ann", Money::from_cents(1)))
            .is_err());
        assert!(env.store.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let env = TestEnv::signed_in().await;
        env.remote.insert(record("srv-5", 300)).unwrap();
        let fetched = env.store.fetch_today_expenses().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].is_ready());

        let mut changed = fetched[0].clone();
        changed.set_amount(Money::from_cents(450));
        let changed = env.store.update_expense(changed).unwrap();
        assert_eq!(changed.lifecycle(), Lifecycle::Edited);
        assert_eq!(env.store.pending().unwrap()[0].kind(), OperationType::Update);

        env.store.sync_pending().await.unwrap();
        assert_eq!(env.remote.record("srv-5").unwrap().unwrap().amount, 450);
        let list = env.store.expenses().into_value().unwrap();
        assert!(list[0].is_ready());
        assert_eq!(list[0].amount().cents(), 450);

        let deleted = env.store.delete_expense("srv-5").unwrap();
        assert_eq!(deleted.lifecycle(), Lifecycle::Deleted);
        assert_eq!(
            env.store.expenses().into_value().unwrap()[0].lifecycle(),
            Lifecycle::Deleted
        );
        env.store.sync_pending().await.unwrap();
        assert!(env.store.expenses().into_value().unwrap().is_empty());
        assert!(env.remote.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let env = TestEnv::signed_in().await;
        assert!(env.store.delete_expense("nope").is_err());
        let mut stranger = Expense::new("Ann", Money::from_cents(1));
        stranger.set_id("srv-1");
        assert!(env.store.update_expense(stranger).is_err());
        assert!(env.store.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_period() {
        let env = TestEnv::signed_in().await;
        let today = TimePeriod::today();
        assert!(!env.store.set_period(today));
        assert!(env.store.expenses().is_available());

        assert!(env.store.set_period(TimePeriod::this_month()));
        assert!(env.store.expenses().is_empty());
        assert_eq!(env.store.period(), Some(TimePeriod::this_month()));
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let env = TestEnv::signed_in().await;
        env.remote.set_offline(true);
        let err = env.store.fetch_week_expenses().await.unwrap_err();
        assert!(err.to_string().contains("unreachable"));
        assert!(env.store.expenses().has_error());
        assert_eq!(env.store.period(), Some(TimePeriod::this_week()));
    }

    #[tokio::test]
    async fn test_stale_fetch_is_discarded() {
        let env = TestEnv::signed_in().await;
        env.remote.insert(record("srv-1", 100)).unwrap();
        env.remote.pause();
        let calls = env.remote.calls();

        let task = {
            let store = env.store.clone();
            tokio::spawn(async move { store.fetch_month_expenses().await })
        };
        while env.remote.calls() == calls {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let other_day = TimePeriod::day(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
        env.store.set_period(other_day);
        env.remote.release(1);

        let fetched = task.await.unwrap().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(env.store.period(), Some(other_day));
        assert!(env.store.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_server_record_is_skipped() {
        let env = TestEnv::signed_in().await;
        let mut bad = record("srv-bad", 100);
        bad.date = i64::MAX;
        let merged = env
            .store
            .merge_pending(TimePeriod::today(), vec![record("srv-1", 250), bad])
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id(), "srv-1");
    }

    #[tokio::test]
    async fn test_offline_changes_survive_restart() {
        let env = TestEnv::signed_in().await;
        env.remote.set_offline(true);
        let added = env
            .store
            .add_expense(Expense::new("Ann", Money::from_cents(999)))
            .unwrap();
        let outcome = env.store.sync_pending().await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Halted { .. }));

        // Same storage, new process, server still down.
        let restarted = TestEnv::with_storage(env.storage.clone());
        restarted.remote.set_offline(true);
        restarted.store.load_user().await.unwrap();
        assert!(restarted.store.expenses().has_error());
        let offline = restarted.store.work_offline(TimePeriod::today()).unwrap();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].id(), added.id());
        assert_eq!(offline[0].lifecycle(), Lifecycle::Created);

        // The server comes back.
        restarted.remote.set_offline(false);
        restarted.remote.insert(record("srv-9", 10)).unwrap();
        let merged = restarted.store.fetch_today_expenses().await.unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(restarted.store.unsynchronized().len(), 1);

        restarted.store.sync_pending().await.unwrap();
        let list = restarted.store.expenses().into_value().unwrap();
        assert!(list.iter().all(Expense::is_ready));
        assert!(list.iter().any(|e| e.amount().cents() == 999));
        assert_eq!(restarted.remote.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_category_lookup() {
        let env = TestEnv::new();
        assert_eq!(env.store.category("FOOD").unwrap().icon(), "food");
        assert!(env.store.category("travel").is_none());
        assert_eq!(env.store.users().len(), 2);
        assert_eq!(env.store.categories().len(), 2);
    }
}
