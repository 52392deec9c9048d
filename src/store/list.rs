use crate::loadable::Loadable;
use crate::model::Expense;
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// The observable expense list. Every change publishes a whole new `Loadable`, so a subscriber is
/// notified once per change and never sees a partly updated list.
///
/// Clones share the same list.
#[derive(Debug, Clone)]
pub struct ExpenseList {
    tx: Arc<watch::Sender<Loadable<Vec<Expense>>>>,
}

impl Default for ExpenseList {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseList {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Loadable::empty());
        Self { tx: Arc::new(tx) }
    }

    /// Publishes `value`. An available list is sorted by date, newest first.
    pub fn set(&self, value: Loadable<Vec<Expense>>) {
        let value = value.map(|mut list| {
            sort(&mut list);
            list
        });
        self.tx.send_replace(value);
    }

    pub fn snapshot(&self) -> Loadable<Vec<Expense>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Loadable<Vec<Expense>>> {
        self.tx.subscribe()
    }

    pub fn is_available(&self) -> bool {
        self.tx.borrow().is_available()
    }

    /// Finds expense `id` in an available list.
    pub fn find(&self, id: &str) -> Option<Expense> {
        self.tx
            .borrow()
            .value()
            .and_then(|list| list.iter().find(|e| e.id() == id).cloned())
    }

    pub fn insert(&self, expense: Expense) -> Result<()> {
        self.change(|list| {
            list.push(expense);
            Some(())
        })
        .map(|_| ())
    }

    /// Swaps the expense with id `id` for `expense`. Returns `false` when there is no such expense.
    pub fn replace(&self, id: &str, expense: Expense) -> Result<bool> {
        let replaced = self.change(|list| {
            let slot = list.iter_mut().find(|e| e.id() == id)?;
            *slot = expense;
            Some(())
        })?;
        Ok(replaced.is_some())
    }

    /// Applies `f` to expense `id` and returns the changed copy.
    pub fn update<F>(&self, id: &str, f: F) -> Result<Option<Expense>>
    where
        F: FnOnce(&mut Expense),
    {
        self.change(|list| {
            let slot = list.iter_mut().find(|e| e.id() == id)?;
            f(slot);
            Some(slot.clone())
        })
    }

    pub fn remove(&self, id: &str) -> Result<Option<Expense>> {
        self.change(|list| {
            let index = list.iter().position(|e| e.id() == id)?;
            Some(list.remove(index))
        })
    }

    /// Runs `f` over a copy of the available list and publishes the copy when `f` returns `Some`.
    /// Fails when the list is not available.
    fn change<R, F>(&self, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut Vec<Expense>) -> Option<R>,
    {
        let mut available = false;
        let mut out = None;
        self.tx.send_if_modified(|current| {
            let Loadable::Available(list) = current else {
                return false;
            };
            available = true;
            let mut next = list.clone();
            out = f(&mut next);
            if out.is_none() {
                return false;
            }
            sort(&mut next);
            *current = Loadable::Available(next);
            true
        });
        anyhow::ensure!(available, "The expense list is not available");
        Ok(out)
    }
}

fn sort(list: &mut [Expense]) {
    list.sort_by(|a, b| b.date().cmp(&a.date()));
}
