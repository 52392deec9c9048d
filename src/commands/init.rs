use crate::args::{AddUserArgs, InitArgs};
use crate::commands::Out;
use crate::model::User;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and an initial `config.json` pointing at the server given in
/// `args`, along with default settings.
///
/// # Arguments
/// - `expenses_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/expenses`
/// - `args` - The server endpoint and, optionally, a first user.
///
/// # Errors
/// - Returns an error if the endpoint is not an http(s) URL, the directory was already
///   initialized, or any file operations fail.
pub async fn init(expenses_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let mut config = Config::create(expenses_home, args.endpoint())
        .await
        .context("Unable to create the data directory and configs")?;
    if let Some((name, password, email)) = args.user() {
        config.add_user(User::new(name, email, password)).await?;
    }
    Ok(format!(
        "Successfully created the expenses directory at '{}'",
        config.root().display()
    )
    .into())
}

/// Adds a user to the config file so they can sign in on this device.
pub async fn add_user(mut config: Config, args: &AddUserArgs) -> Result<Out<()>> {
    let mut user = User::new(args.name(), args.email(), args.password());
    if let Some(color) = args.color() {
        user = user.with_color(color);
    }
    config.add_user(user).await?;
    Ok(format!("Added user {}", args.name()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_with_a_first_user() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("expenses");
        let args = InitArgs::new("https://example.com/graphql");
        init(&home, &args).await.unwrap();

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.endpoint().as_str(), "https://example.com/graphql");
        assert!(config.users().is_empty());

        add_user(config, &AddUserArgs::new("Ann", "pw")).await.unwrap();
        let config = Config::load(&home).await.unwrap();
        assert!(config.users().authenticate("ann", "pw").is_some());

        // Names are unique regardless of case.
        assert!(add_user(config, &AddUserArgs::new("ANN", "x")).await.is_err());
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let args = InitArgs::new("http://localhost:4000/graphql");
        init(dir.path(), &args).await.unwrap();
        assert!(init(dir.path(), &args).await.is_err());
    }

    #[tokio::test]
    async fn test_init_rejects_a_bad_endpoint() {
        let dir = TempDir::new().unwrap();
        let args = InitArgs::new("ftp://example.com");
        assert!(init(dir.path(), &args).await.is_err());
        assert!(!dir.path().join("config.json").exists());
    }
}
