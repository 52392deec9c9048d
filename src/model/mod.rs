//! Types that represent the core data model, such as `Expense` and `Money`.
mod category;
mod expense;
mod money;
pub mod stats;
mod user;

pub use category::{Categories, Category};
pub use expense::{Expense, ExpenseRecord, ExpenseVars, Lifecycle, PLACEHOLDER_PREFIX};
pub use money::{Money, MoneyError};
pub use user::{User, Users};
