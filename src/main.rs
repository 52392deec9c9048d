use clap::Parser;
use expense_sync::args::{Args, Command};
use expense_sync::{commands, Config, Mode, Result, Store};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expenses_home().path();

    // This allows for testing the program without a server. When EXPENSES_IN_TEST_MODE is set and
    // non-zero in length, then the mode will be Mode::Test, otherwise it will be Mode::Graphql.
    let mode = Mode::from_env();

    // Commands that work on the configuration alone.
    match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args).await?.print();
            return Ok(());
        }
        Command::AddUser(user_args) => {
            let config = Config::load(home).await?;
            commands::add_user(config, user_args).await?.print();
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(home).await?;
    let store = Store::from_config(&config, mode)?;

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(_) | Command::AddUser(_) => {}
        Command::Login(login_args) => commands::login(&store, login_args).await?.print(),
        Command::Logout => commands::logout(&store).await?.print(),
        Command::Whoami => commands::whoami(&store).await?.print(),
        Command::Add(add_args) => commands::add(&store, add_args).await?.print(),
        Command::List(period_args) => commands::list(&store, period_args).await?.print(),
        Command::Edit(edit_args) => commands::edit(&store, edit_args).await?.print(),
        Command::Delete(delete_args) => commands::delete(&store, delete_args).await?.print(),
        Command::Stats(period_args) => commands::stats(&store, period_args).await?.print(),
        Command::Pending => commands::pending(&store).await?.print(),
        Command::Sync => commands::sync(&store).await?.print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                "expense_sync",
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
