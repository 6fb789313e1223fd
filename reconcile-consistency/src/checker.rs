//! Consistency checker: decides whether observed remote state has converged
//! on the expected configuration.
//!
//! States:
//! `Initialized → Checking → {Converged, DivergedRetry, DivergedTerminal}`.
//!
//! Divergence is only a retryable signal while attempts remain. The attempt
//! ceiling is independent of, and usually much smaller than, the
//! orchestrator's deadline, so a real configuration drift is not retried for
//! minutes under the guise of "still converging".

use reconcile_core::{
    AttemptError, AttributeDivergence, ConsistencyResult, Divergence, ResourceLabel,
    RetryableOutcome,
};

use crate::canonical::{is_empty_value, render, values_equal};
use crate::rules::{AttributeRule, AttributeRules};
use crate::state::{ExpectedState, ObservedState};

const REDACTED: &str = "(sensitive)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    Initialized,
    Checking,
    Converged,
    DivergedRetry,
    DivergedTerminal,
}

/// One checker per reconciliation run; never shared between runs.
#[derive(Debug)]
pub struct ConsistencyChecker {
    label: ResourceLabel,
    expected: ExpectedState,
    rules: AttributeRules,
    max_attempts: u32,
    attempts: u32,
    state: CheckerState,
    terminal: Option<Divergence>,
}

impl ConsistencyChecker {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(
        expected: ExpectedState,
        rules: AttributeRules,
        max_attempts: u32,
        label: impl Into<ResourceLabel>,
    ) -> Self {
        Self {
            label: label.into(),
            expected,
            rules,
            max_attempts: max_attempts.max(1),
            attempts: 0,
            state: CheckerState::Initialized,
            terminal: None,
        }
    }

    pub fn state(&self) -> CheckerState {
        self.state
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn label(&self) -> &ResourceLabel {
        &self.label
    }

    pub fn expected(&self) -> &ExpectedState {
        &self.expected
    }

    /// Compare `observed` against the expected state and classify the result.
    ///
    /// Convergence never consumes an attempt. Each divergent call consumes one;
    /// the call that reaches `max_attempts` is terminal, and every call after
    /// that repeats the same terminal outcome.
    pub fn check(&mut self, observed: &ObservedState) -> RetryableOutcome<ConsistencyResult> {
        if let Some(divergence) = &self.terminal {
            return RetryableOutcome::Terminal(AttemptError::Diverged(divergence.clone()));
        }

        self.state = CheckerState::Checking;
        let attributes = self.divergences(observed);
        if attributes.is_empty() {
            self.state = CheckerState::Converged;
            return RetryableOutcome::Success(ConsistencyResult::converged(self.attempts));
        }

        self.attempts += 1;
        for attr in &attributes {
            tracing::debug!(
                resource = %self.label,
                attribute = %attr.name,
                expected = %attr.expected,
                observed = %attr.observed,
                attempt = self.attempts,
                "attribute has not converged"
            );
        }

        let divergence = Divergence {
            attributes,
            attempts_used: self.attempts,
            max_attempts: self.max_attempts,
        };
        if self.attempts < self.max_attempts {
            self.state = CheckerState::DivergedRetry;
            RetryableOutcome::Continue(AttemptError::Diverged(divergence))
        } else {
            self.state = CheckerState::DivergedTerminal;
            tracing::warn!(
                resource = %self.label,
                attributes = ?divergence.attribute_names(),
                attempts = self.attempts,
                "attributes never converged"
            );
            self.terminal = Some(divergence.clone());
            RetryableOutcome::Terminal(AttemptError::Diverged(divergence))
        }
    }

    /// Every divergent attribute, in name order, without touching the attempt
    /// counter.
    pub fn divergences(&self, observed: &ObservedState) -> Vec<AttributeDivergence> {
        let default_rule = AttributeRule::default();
        self.expected
            .iter()
            .filter_map(|(name, expected)| {
                let observed = observed.get(name)?;
                let rule = self.rules.get(name).unwrap_or(&default_rule);
                if attribute_matches(rule, expected, observed) {
                    return None;
                }
                Some(self.describe(name, rule, expected, observed))
            })
            .collect()
    }

    fn describe(
        &self,
        name: &str,
        rule: &AttributeRule,
        expected: &serde_json::Value,
        observed: &serde_json::Value,
    ) -> AttributeDivergence {
        let (expected, observed) = if rule.sensitive {
            (REDACTED.to_string(), REDACTED.to_string())
        } else {
            (render(expected), render(observed))
        };
        AttributeDivergence {
            name: name.to_string(),
            expected,
            observed,
        }
    }
}

fn attribute_matches(
    rule: &AttributeRule,
    expected: &serde_json::Value,
    observed: &serde_json::Value,
) -> bool {
    if rule.computed && is_empty_value(expected) {
        return true;
    }
    if rule.suppresses(expected, observed) {
        return true;
    }
    values_equal(expected, observed, rule.unordered)
}
