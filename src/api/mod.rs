//! The boundary to the expense server.
//!
//! `Remote` is the narrow interface the rest of the crate talks to. `GraphqlRemote` implements it
//! over HTTP and `TestRemote` implements it in memory, so the whole program can run without a
//! server.

mod graphql;
mod queries;
mod test_remote;

use crate::model::{ExpenseRecord, ExpenseVars};
use crate::period::DateRange;
use crate::{Config, Result};
use std::sync::Arc;
use tracing::debug;

pub use graphql::GraphqlRemote;
pub use test_remote::TestRemote;

/// When this environment variable is set to a non-empty value, `Mode::from_env` selects the
/// in-memory server.
pub const TEST_MODE_ENV: &str = "EXPENSES_IN_TEST_MODE";

/// Selects the `Remote` implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Talk to the GraphQL server named in the config.
    #[default]
    Graphql,
    /// Use an in-memory server.
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Graphql,
        }
    }
}

/// The operations the expense server offers.
#[async_trait::async_trait]
pub trait Remote: Send + Sync {
    /// Creates an expense and returns it with its permanent id.
    async fn create_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord>;

    /// Replaces the expense named by `vars.id`.
    async fn update_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord>;

    /// Deletes an expense and returns what was deleted.
    async fn delete_expense(&self, id: &str) -> Result<ExpenseRecord>;

    /// All expenses dated within `range`.
    async fn fetch_expenses(&self, range: &DateRange) -> Result<Vec<ExpenseRecord>>;
}

/// Builds the `Remote` for `mode`.
pub fn remote(config: &Config, mode: Mode) -> Result<Arc<dyn Remote>> {
    debug!("Using the {mode:?} remote");
    Ok(match mode {
        Mode::Test => Arc::new(TestRemote::new()),
        Mode::Graphql => Arc::new(GraphqlRemote::new(
            config.endpoint().clone(),
            config.credentials().map(str::to_string),
            config.request_timeout(),
        )?),
    })
}
