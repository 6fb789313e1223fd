//! Expected and observed attribute snapshots.
//!
//! Both are keyed by attribute name and ordered by it, so divergence reports
//! come out in a stable order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute values captured from the last applied configuration.
///
/// Built once per reconciliation run, before any retries, and never changed
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedState(BTreeMap<String, Value>);

impl ExpectedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from a JSON object; `None` for any other JSON value.
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .as_object()
            .map(|map| Self(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }
}

impl FromIterator<(String, Value)> for ExpectedState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Attribute values most recently read from the remote platform.
///
/// Write-only attributes (never returned by reads) and purely computed ones
/// are simply absent; absence means "not compared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState(BTreeMap<String, Value>);

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from a JSON object; `None` for any other JSON value.
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .as_object()
            .map(|map| Self(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }
}

impl FromIterator<(String, Value)> for ObservedState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
