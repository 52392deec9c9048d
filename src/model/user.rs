use serde::{Deserialize, Serialize};

const DEFAULT_COLOR: &str = "#000000";

/// A person who can sign in and own expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    name: String,
    #[serde(default)]
    email: String,
    passwd: String,
    #[serde(default = "default_color")]
    color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        passwd: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            passwd: passwd.into(),
            color: default_color(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    fn check_password(&self, password: &str) -> bool {
        self.passwd == password
    }
}

/// The users known to this installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Users(Vec<User>);

impl Users {
    pub fn new(users: Vec<User>) -> Self {
        Self(users)
    }

    /// Exact name match.
    pub fn find(&self, name: &str) -> Option<&User> {
        self.0.iter().find(|u| u.name == name)
    }

    /// Case-insensitive name match plus an exact password match.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        let username = username.to_lowercase();
        self.0
            .iter()
            .find(|u| u.name.to_lowercase() == username && u.check_password(password))
    }

    pub fn push(&mut self, user: User) {
        self.0.push(user);
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
