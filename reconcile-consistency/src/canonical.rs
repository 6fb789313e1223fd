//! Canonical forms for comparing expected and observed values.
//!
//! Rules:
//! 1. `null`, `""`, `[]`, `{}` and a one-element list holding an empty value
//!    are all [`Canonical::Empty`].
//! 2. Numbers compare by exact decimal text: integers digit for digit, floats
//!    by their shortest round-trip form, so `1` equals `1.0`. A string equals a
//!    number only when it is already that number's canonical text (`"5"` is
//!    5, `"007"`, `"+5"` and `"1e3"` stay text). `"true"` / `"false"` compare
//!    equal to booleans.
//! 3. Objects compare key-wise over the union of keys; a missing key is Empty.
//! 4. Lists compare in order, or as multisets of SHA-256 fingerprints when the
//!    attribute is unordered.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Longest rendered value kept in logs and error messages.
const RENDER_LIMIT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    Empty,
    Bool(bool),
    /// Exact decimal text of the number.
    Number(String),
    Text(String),
    List(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

impl Canonical {
    pub fn is_empty(&self) -> bool {
        matches!(self, Canonical::Empty)
    }

    /// Stable SHA-256 hex digest of this canonical value.
    pub fn fingerprint(&self) -> String {
        let mut encoded = String::new();
        self.encode(&mut encoded);
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn encode(&self, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = match self {
            Canonical::Empty => write!(out, "e;"),
            Canonical::Bool(b) => write!(out, "b:{b};"),
            Canonical::Number(n) => write!(out, "n:{n};"),
            Canonical::Text(s) => write!(out, "t:{}:{s};", s.len()),
            Canonical::List(items) => {
                let _ = write!(out, "l:{}[", items.len());
                for item in items {
                    item.encode(out);
                }
                write!(out, "]")
            }
            Canonical::Map(entries) => {
                let _ = write!(out, "m:{}{{", entries.len());
                for (key, value) in entries {
                    let _ = write!(out, "{}:{key}=", key.len());
                    value.encode(out);
                }
                write!(out, "}}")
            }
        };
    }
}

/// Reduce a JSON value to its canonical form.
pub fn canonicalize(value: &Value) -> Canonical {
    match value {
        Value::Null => Canonical::Empty,
        Value::Bool(b) => Canonical::Bool(*b),
        Value::Number(n) => match number_text(n) {
            Some(text) => Canonical::Number(text),
            None => Canonical::Text(n.to_string()),
        },
        Value::String(s) => canonicalize_str(s),
        Value::Array(items) => {
            let items: Vec<Canonical> = items.iter().map(canonicalize).collect();
            match items.as_slice() {
                [] => Canonical::Empty,
                [only] if only.is_empty() => Canonical::Empty,
                _ => Canonical::List(items),
            }
        }
        Value::Object(map) => {
            let entries: BTreeMap<String, Canonical> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .filter(|(_, v)| !v.is_empty())
                .collect();
            if entries.is_empty() {
                Canonical::Empty
            } else {
                Canonical::Map(entries)
            }
        }
    }
}

fn canonicalize_str(s: &str) -> Canonical {
    if s.is_empty() {
        return Canonical::Empty;
    }
    match s {
        "true" => return Canonical::Bool(true),
        "false" => return Canonical::Bool(false),
        _ => {}
    }
    match exact_number_text(s) {
        Some(text) => Canonical::Number(text),
        None => Canonical::Text(s.to_string()),
    }
}

fn number_text(n: &serde_json::Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    n.as_f64().filter(|f| f.is_finite()).map(float_text)
}

// `Display` for f64 never uses exponent notation and drops a zero fraction.
fn float_text(f: f64) -> String {
    if f == 0.0 {
        "0".to_string()
    } else {
        f.to_string()
    }
}

/// The canonical text of `s` as a number, only if `s` already is that text.
/// Leading zeros, a `+` sign, exponents and digits beyond `f64` precision all
/// fail the round trip.
fn exact_number_text(s: &str) -> Option<String> {
    let text = if let Ok(i) = s.parse::<i64>() {
        i.to_string()
    } else if let Ok(u) = s.parse::<u64>() {
        u.to_string()
    } else {
        float_text(s.parse::<f64>().ok().filter(|f| f.is_finite())?)
    };
    (text == s).then_some(text)
}

/// Whether the value canonicalizes to [`Canonical::Empty`].
pub fn is_empty_value(value: &Value) -> bool {
    canonicalize(value).is_empty()
}

/// Compare two values after canonicalization. With `unordered`, top-level
/// lists are compared as multisets.
pub fn values_equal(expected: &Value, observed: &Value, unordered: bool) -> bool {
    let expected = canonicalize(expected);
    let observed = canonicalize(observed);
    match (&expected, &observed) {
        (Canonical::List(a), Canonical::List(b)) if unordered => {
            a.len() == b.len() && sorted_fingerprints(a) == sorted_fingerprints(b)
        }
        _ => expected == observed,
    }
}

fn sorted_fingerprints(items: &[Canonical]) -> Vec<String> {
    let mut prints: Vec<String> = items.iter().map(Canonical::fingerprint).collect();
    prints.sort();
    prints
}

/// Compact JSON rendering for diagnostics, truncated to a readable length.
pub fn render(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= RENDER_LIMIT {
        return rendered;
    }
    let truncated: String = rendered.chars().take(RENDER_LIMIT).collect();
    format!("{truncated}…")
}
