//! These structs provide the CLI interface for the expenses CLI.

use crate::model::Money;
use crate::period::Span;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expenses: A command-line tool for tracking shared expenses.
///
/// Expenses are recorded locally first and sent to the GraphQL expense server when it can be
/// reached. Changes made while offline are kept in a queue in the data directory and sent, in the
/// order they were made, the next time a command gets through to the server.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and its configuration file.
    ///
    /// This is the first command you should run. Pass the URL of the GraphQL expense server as
    /// --endpoint. A first user can be added at the same time with --user and --password.
    Init(InitArgs),
    /// Add a user who can sign in on this device.
    AddUser(AddUserArgs),
    /// Sign in. The login is remembered for 30 days.
    Login(LoginArgs),
    /// Sign out and forget the remembered login.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Record a new expense.
    Add(AddArgs),
    /// List the expenses of a day, week or month.
    List(PeriodArgs),
    /// Change an expense.
    Edit(EditArgs),
    /// Delete an expense.
    Delete(DeleteArgs),
    /// Show totals by category and by user for a day, week or month.
    Stats(PeriodArgs),
    /// Show the changes that have not reached the server yet.
    Pending,
    /// Send the queued changes to the server now.
    Sync,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where expense data and configuration is held. Defaults to ~/expenses
    #[arg(long, env = "EXPENSES_HOME", default_value_t = default_expenses_home())]
    expenses_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expenses_home: PathBuf) -> Self {
        Self {
            log_level,
            expenses_home: expenses_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expenses_home(&self) -> &DisplayPath {
        &self.expenses_home
    }
}

/// (Not shown): Args for the `expenses init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the GraphQL expense server, e.g. https://expenses.example.com/graphql
    #[arg(long)]
    endpoint: String,

    /// The name of a first user to add. Requires --password.
    #[arg(long, requires = "password")]
    user: Option<String>,

    /// The password of the first user.
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// The email of the first user.
    #[arg(long, requires = "user")]
    email: Option<String>,
}

impl InitArgs {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: None,
            password: None,
            email: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The first user as `(name, password, email)`, when one was given.
    pub fn user(&self) -> Option<(&str, &str, &str)> {
        let name = self.user.as_deref()?;
        let password = self.password.as_deref()?;
        Some((name, password, self.email.as_deref().unwrap_or_default()))
    }
}

/// (Not shown): Args for the `expenses add-user` command.
#[derive(Debug, Parser, Clone)]
pub struct AddUserArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    password: String,

    #[arg(long, default_value = "")]
    email: String,

    /// The color used for this user's totals, e.g. #ff0000
    #[arg(long)]
    color: Option<String>,
}

impl AddUserArgs {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            email: String::new(),
            color: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }
}

/// (Not shown): Args for the `expenses login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long, short = 'u')]
    username: String,

    #[arg(long, short = 'p')]
    password: String,
}

impl LoginArgs {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `expenses add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount, e.g. 12.50
    #[arg(long, short = 'a', allow_hyphen_values = true)]
    amount: Money,

    #[arg(long, short = 'c')]
    category: Option<String>,

    #[arg(long, short = 'd')]
    description: Option<String>,

    /// The day the money was spent, e.g. 2024-03-15. Defaults to now.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl AddArgs {
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            category: None,
            description: None,
            date: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `expenses list` and `expenses stats` commands.
#[derive(Debug, Parser, Clone, Default)]
pub struct PeriodArgs {
    /// One of day, week, month.
    #[arg(value_enum, default_value_t = Span::Day)]
    span: Span,

    /// Any day within the period. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl PeriodArgs {
    pub fn new(span: Span, date: Option<NaiveDate>) -> Self {
        Self { span, date }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `expenses edit` command. Fields that are not given keep their value.
#[derive(Debug, Parser, Clone)]
pub struct EditArgs {
    id: String,

    /// A day in the month of the expense. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long, short = 'a', allow_hyphen_values = true)]
    amount: Option<Money>,

    /// The new category. An empty string clears it.
    #[arg(long, short = 'c')]
    category: Option<String>,

    /// The new description. An empty string clears it.
    #[arg(long, short = 'd')]
    description: Option<String>,
}

impl EditArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: None,
            amount: None,
            category: None,
            description: None,
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn amount(&self) -> Option<Money> {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// (Not shown): Args for the `expenses delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    id: String,

    /// A day in the month of the expense. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl DeleteArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

fn default_expenses_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expenses-home or EXPENSES_HOME instead of relying on the \
                default directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
