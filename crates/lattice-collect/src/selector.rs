//! Equality label selectors
//!
//! A selector is a set of `key=value` pairs that must all be present on an
//! object's labels. An empty selector matches everything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label selector with AND semantics over exact key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    /// Selector that matches every object
    pub fn everything() -> Self {
        Self::default()
    }

    /// Whether the selector has no constraints
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every selector pair appears in `labels`
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Render for a list call (`k1=v1,k2=v2`, keys sorted)
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Add a constraint, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl From<BTreeMap<String, String>> for LabelSelector {
    fn from(pairs: BTreeMap<String, String>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<(String, String)> for LabelSelector {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query())
    }
}

/// A single `key=value` selector pair, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPair {
    /// Label key
    pub key: String,
    /// Required value
    pub value: String,
}

impl FromStr for SelectorPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty label key in {:?}", s));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}
