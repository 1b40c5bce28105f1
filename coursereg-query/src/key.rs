use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Query parameters of a list request.
///
/// Kept sorted by name, so two parameter sets describing the same logical query compare and
/// hash equal no matter in which order they were built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct ListParams(BTreeMap<String, String>);

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size (`per_page`).
    pub fn per_page(self, per_page: u32) -> Self {
        self.filter("per_page", per_page)
    }

    /// Free text search (`search`).
    pub fn search(self, search: impl fmt::Display) -> Self {
        self.filter("search", search)
    }

    /// A resource specific filter, replacing an earlier value of the same name.
    pub fn filter(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    /// Adds a filter only if a value is present.
    pub fn maybe_filter<T: fmt::Display>(self, name: impl Into<String>, value: &Option<T>) -> Self {
        match value {
            Some(value) => self.filter(name, value),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Cache identity of a list query: the cache name of a resource plus its effective parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    name: String,
    params: ListParams,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>, params: ListParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ListParams {
        &self.params
    }

    /// Whether invalidating the cache name `name` affects this key.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            f.write_str("[")?;
            for (i, (name, value)) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{name}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
