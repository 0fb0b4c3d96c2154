use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub collection: Option<String>,
    pub name: String,
    /// Written as `"name"` or `[name]` in the source.
    pub quoted: bool,
}

impl Column {
    pub fn name(name: &str) -> Self {
        Self { collection: None, name: name.to_string(), quoted: false }
    }

    pub fn with_collection(collection: &str, name: &str) -> Self {
        Self { collection: Some(collection.to_string()), name: name.to_string(), quoted: false }
    }

    /// Key of this column inside a retrieved row: `alias.name` for link-entity
    /// attributes, the bare name otherwise.
    pub fn row_key(&self) -> String {
        match &self.collection {
            Some(c) => format!("{}.{}", c, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(c) => write!(f, "{}.{}", c.to_lowercase(), self.name.to_lowercase()),
            None => write!(f, "{}", self.name.to_lowercase()),
        }
    }
}
