//! Built-in diff-suppression predicates.
//!
//! Each has the [`crate::DiffSuppressFn`] shape `(expected, observed) -> bool`
//! and can be registered with [`crate::AttributeRules::suppress_with`].

use serde_json::Value;

use crate::canonical::values_equal;

/// Two JSON documents with the same content, whatever their formatting or key
/// order. Either side may be a string holding JSON or an already-structured
/// value.
pub fn equivalent_json(expected: &Value, observed: &Value) -> bool {
    match (parse_embedded_json(expected), parse_embedded_json(observed)) {
        (Some(e), Some(o)) => values_equal(&e, &o, false),
        _ => false,
    }
}

fn parse_embedded_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

pub fn case_insensitive(expected: &Value, observed: &Value) -> bool {
    match (expected.as_str(), observed.as_str()) {
        (Some(e), Some(o)) => e.to_lowercase() == o.to_lowercase(),
        _ => false,
    }
}

pub fn ignore_surrounding_whitespace(expected: &Value, observed: &Value) -> bool {
    match (expected.as_str(), observed.as_str()) {
        (Some(e), Some(o)) => e.trim() == o.trim(),
        _ => false,
    }
}

/// Phone numbers written with different punctuation, e.g. `+1 (317) 555-0100`
/// and `+13175550100`.
pub fn equivalent_phone_number(expected: &Value, observed: &Value) -> bool {
    match (
        expected.as_str().and_then(phone_digits),
        observed.as_str().and_then(phone_digits),
    ) {
        (Some(e), Some(o)) => e == o,
        _ => false,
    }
}

fn phone_digits(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(if international {
        format!("+{digits}")
    } else {
        digits
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(r#"{"a": 1, "b": [1, 2]}"#), json!(r#"{"b":[1,2],"a":1}"#), true)]
    #[case(json!(r#"{"a": 1}"#), json!({"a": 1}), true)]
    #[case(json!(r#"{"a": 1}"#), json!(r#"{"a": 2}"#), false)]
    #[case(json!(r#"{"a": 1"#), json!(r#"{"a": 1}"#), false)]
    fn json_equivalence(#[case] expected: Value, #[case] observed: Value, #[case] equal: bool) {
        assert_eq!(equivalent_json(&expected, &observed), equal);
    }

    #[test]
    fn case_and_whitespace() {
        assert!(case_insensitive(&json!("Support Queue"), &json!("support queue")));
        assert!(!case_insensitive(&json!("a"), &json!(1)));
        assert!(ignore_surrounding_whitespace(&json!("  hi \n"), &json!("hi")));
        assert!(!ignore_surrounding_whitespace(&json!("h i"), &json!("hi")));
    }

    #[rstest]
    #[case("+1 (317) 555-0100", "+13175550100", true)]
    #[case("317.555.0100", "3175550100", true)]
    #[case("+13175550100", "13175550100", false)]
    #[case("ext", "ext", false)]
    fn phone_numbers(#[case] expected: &str, #[case] observed: &str, #[case] equal: bool) {
        assert_eq!(
            equivalent_phone_number(&json!(expected), &json!(observed)),
            equal
        );
    }
}
