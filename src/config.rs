//! Configuration file handling for the expense tracker.
//!
//! The configuration file is stored at `$EXPENSES_HOME/config.json` and contains the server
//! endpoint, the retry settings for pending changes, and the known users and categories.

use crate::model::{Categories, Category, User, Users};
use crate::sync::RetryPolicy;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "expenses";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const STORAGE_JSON: &str = "storage.json";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSES_HOME` and from there it loads `$EXPENSES_HOME/config.json`. It provides
/// paths to the other files that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    storage_path: PathBuf,
    config_file: ConfigFile,
    endpoint: Url,
}

impl Config {
    /// Creates the home directory and an initial `config.json` that points at `endpoint`, with
    /// default settings, the default categories and no users.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/expenses`
    /// - `endpoint` - The URL of the GraphQL server, e.g. `https://example.com/graphql`
    ///
    /// # Errors
    /// - Returns an error if the endpoint is not a valid URL, the config file already exists, or
    ///   any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, endpoint: &str) -> Result<Self> {
        let endpoint_url = parse_endpoint(endpoint)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expenses home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            );
        }

        let config_file = ConfigFile {
            endpoint: endpoint.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            storage_path: root.join(STORAGE_JSON),
            root,
            config_path,
            config_file,
            endpoint: endpoint_url,
        })
    }

    /// This will
    /// - validate that `expenses_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(expenses_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = expenses_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expenses home directory is missing, run 'expenses init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let endpoint = parse_endpoint(&config_file.endpoint)?;

        Ok(Self {
            storage_path: root.join(STORAGE_JSON),
            root,
            config_path,
            config_file,
            endpoint,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where the remembered login and the pending queue are kept.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn credentials(&self) -> Option<&str> {
        self.config_file.credentials.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.request_timeout_secs)
    }

    pub fn retry(&self) -> RetryPolicy {
        self.config_file.retry
    }

    pub fn users(&self) -> &Users {
        &self.config_file.users
    }

    pub fn categories(&self) -> &Categories {
        &self.config_file.categories
    }

    /// Adds a user that can sign in and saves the config file.
    pub async fn add_user(&mut self, user: User) -> Result<()> {
        let name = user.name().to_lowercase();
        if self
            .config_file
            .users
            .iter()
            .any(|u| u.name().to_lowercase() == name)
        {
            bail!("A user named '{}' already exists", user.name());
        }
        self.config_file.users.push(user);
        self.config_file.save(&self.config_path).await
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expenses",
///   "config_version": 1,
///   "endpoint": "https://example.com/graphql",
///   "credentials": "s3cr3t",
///   "request_timeout_secs": 30,
///   "retry": { "initial_delay_ms": 2000, "max_delay_ms": 300000, "max_attempts": 8 },
///   "users": [{ "name": "Ann", "email": "ann@example.com", "passwd": "pw", "color": "#ff0000" }],
///   "categories": [{ "name": "food", "icon": "food" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expenses"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL of the GraphQL server
    endpoint: String,

    /// Bearer token sent with every request, if the server needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials: Option<String>,

    /// Upper bound for a single server call
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// Backoff for resending pending changes after a failure
    #[serde(default)]
    retry: RetryPolicy,

    #[serde(default)]
    users: Users,

    #[serde(default = "default_categories")]
    categories: Categories,
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_categories() -> Categories {
    Categories::new(
        [
            ("food", "food"),
            ("groceries", "cart"),
            ("transport", "car"),
            ("rent", "house"),
            ("bills", "receipt"),
            ("fun", "ticket"),
            ("health", "heart"),
            ("other", "dots"),
        ]
        .into_iter()
        .map(|(name, icon)| Category::new(name, icon))
        .collect(),
    )
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            endpoint: String::new(),
            credentials: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            users: Users::default(),
            categories: default_categories(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another app or version
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {}, expected {}",
            config.config_version,
            CONFIG_VERSION
        );
        anyhow::ensure!(
            config.request_timeout_secs > 0,
            "request_timeout_secs must be greater than zero"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    #[cfg(test)]
    fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = Users::new(users);
        self
    }
}

/// Parses and checks the server endpoint, which must be an http or https URL.
fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .with_context(|| format!("Invalid endpoint URL '{endpoint}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Invalid endpoint URL '{endpoint}': unsupported scheme '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("expenses_home");
        let endpoint = "https://example.com/graphql";

        // Run the function under test:
        let config = Config::create(&home_dir, endpoint).await.unwrap();

        assert_eq!(config.endpoint().as_str(), endpoint);
        assert!(config.config_path().is_file());
        assert_eq!(config.storage_path(), config.root().join(STORAGE_JSON));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry(), RetryPolicy::default());
        assert!(config.users().is_empty());
        assert!(config.categories().find("food").is_some());
        assert!(config.credentials().is_none());

        // Loading what was created gives the same settings.
        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.config_file, config.config_file);
    }

    #[tokio::test]
    async fn test_config_create_twice() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), "http://localhost:4000/graphql")
            .await
            .unwrap();
        let err = Config::create(dir.path(), "http://localhost:4000/graphql")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_config_create_bad_endpoint() {
        let dir = TempDir::new().unwrap();
        assert!(Config::create(dir.path(), "not a url").await.is_err());
        assert!(Config::create(dir.path(), "ftp://example.com").await.is_err());
        assert!(!dir.path().join(CONFIG_JSON).exists());
    }

    #[tokio::test]
    async fn test_add_user() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path(), "https://example.com/graphql")
            .await
            .unwrap();
        config
            .add_user(User::new("Ann", "ann@example.com", "pw"))
            .await
            .unwrap();
        assert!(config
            .add_user(User::new("Ann", "other@example.com", "pw2"))
            .await
            .is_err());

        let loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(loaded.users().len(), 1);
        assert!(loaded.users().authenticate("ann", "pw").is_some());
    }

    #[tokio::test]
    async fn test_config_load_missing() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("The config file is missing"));
        assert!(Config::load(dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original = ConfigFile {
            endpoint: "https://example.com/graphql".into(),
            credentials: Some("token".into()),
            ..ConfigFile::default()
        }
        .with_users(vec![User::new("Ann", "ann@example.com", "pw")]);

        original.save(&config_path).await.unwrap();
        let loaded = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
        assert_eq!(loaded.users.find("Ann").unwrap().color(), "#000000");
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "expenses",
            "config_version": 1,
            "endpoint": "https://example.com/graphql"
        }"#;

        let mut file = tokio::fs::File::create(&config_path).await.unwrap();
        file.write_all(json.as_bytes()).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.request_timeout_secs, REQUEST_TIMEOUT_SECS);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.users.is_empty());
        assert_eq!(config.categories, default_categories());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "endpoint": "https://example.com/graphql"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_wrong_version() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{"app_name": "expenses", "config_version": 9, "endpoint": "http://x"}"#;
        utils::write(&config_path, json).await.unwrap();
        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported config_version"));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("credentials"));
    }

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("https://example.com/graphql").is_ok());
        assert!(parse_endpoint("http://127.0.0.1:4000").is_ok());
        assert!(parse_endpoint("").is_err());
        assert!(parse_endpoint("mailto:ann@example.com").is_err());
    }
}
