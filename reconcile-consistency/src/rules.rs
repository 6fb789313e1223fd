//! Per-attribute comparison rules: the diff-suppression table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// `(expected, observed) -> true` when the two values mean the same thing
/// even though they differ syntactically.
pub type DiffSuppressFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// How one attribute is compared.
#[derive(Clone, Default)]
pub struct AttributeRule {
    suppress: Option<DiffSuppressFn>,
    /// Element order carries no meaning; compare as a multiset.
    pub unordered: bool,
    /// Never write the value to logs or error messages.
    pub sensitive: bool,
    /// The platform may fill the value in when the configuration leaves it
    /// empty.
    pub computed: bool,
}

impl AttributeRule {
    /// Whether a registered predicate declares the pair equivalent.
    pub fn suppresses(&self, expected: &Value, observed: &Value) -> bool {
        self.suppress
            .as_ref()
            .is_some_and(|pred| pred(expected, observed))
    }
}

impl fmt::Debug for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRule")
            .field("suppress", &self.suppress.as_ref().map(|_| "<fn>"))
            .field("unordered", &self.unordered)
            .field("sensitive", &self.sensitive)
            .field("computed", &self.computed)
            .finish()
    }
}

/// Rules keyed by attribute name. Attributes without an entry are compared
/// with the default rule (ordered, not sensitive, no suppression).
#[derive(Debug, Clone, Default)]
pub struct AttributeRules {
    rules: BTreeMap<String, AttributeRule>,
}

impl AttributeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a diff-suppression predicate for `name`.
    pub fn suppress_with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.entry(name).suppress = Some(Arc::new(predicate));
        self
    }

    pub fn unordered(mut self, name: impl Into<String>) -> Self {
        self.entry(name).unordered = true;
        self
    }

    pub fn sensitive(mut self, name: impl Into<String>) -> Self {
        self.entry(name).sensitive = true;
        self
    }

    pub fn computed(mut self, name: impl Into<String>) -> Self {
        self.entry(name).computed = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeRule> {
        self.rules.get(name)
    }

    fn entry(&mut self, name: impl Into<String>) -> &mut AttributeRule {
        self.rules.entry(name.into()).or_default()
    }
}
