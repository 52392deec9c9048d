use serde::{Deserialize, Serialize};

/// A spending category that expenses refer to by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    name: String,
    #[serde(default)]
    icon: String,
}

impl Category {
    pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }
}

/// The categories known to this installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(Vec<Category>);

impl Categories {
    pub fn new(categories: Vec<Category>) -> Self {
        Self(categories)
    }

    /// Looks a category up by name, ignoring case. Empty names never match.
    pub fn find(&self, name: &str) -> Option<&Category> {
        if name.is_empty() {
            return None;
        }
        let name = name.to_lowercase();
        self.0.iter().find(|c| c.name.to_lowercase() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[test]
fn find_category_ignores_case() {
    let categories = Categories::new(vec![
        Category::new("Food", "food"),
        Category::new("Transport", "car"),
    ]);
    assert_eq!(categories.find("food").unwrap().icon(), "food");
    assert_eq!(categories.find("TRANSPORT").unwrap().name(), "Transport");
    assert!(categories.find("").is_none());
    assert!(categories.find("rent").is_none());
}
