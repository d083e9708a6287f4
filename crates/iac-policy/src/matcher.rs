// matcher.rs - Attribute value comparison.
//
// `ValueMatcher` is the seam between filters and comparison semantics.
// Filters resolve an attribute to `Option<&Value>` (None = nothing there)
// and ask the matcher whether it satisfies `expected` under an operator.
//
// Special expected values, honored for every operator:
//   absent   - nothing at the path
//   present  - something at the path
//   not-null - same as present (null already resolves to nothing)
//   empty    - nothing, or an empty string/list/object

use std::cmp::Ordering;
use std::str::FromStr;

use glob::Pattern;
use regex::Regex;
use serde_json::Value;

use crate::error::PolicyError;

/// Comparison operators understood by [`DefaultValueMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Contains,
    Regex,
    Glob,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" | "equal" => Ok(Operator::Eq),
            "ne" | "not-equal" => Ok(Operator::Ne),
            "gt" | "greater-than" => Ok(Operator::Gt),
            "ge" | "gte" => Ok(Operator::Ge),
            "lt" | "less-than" => Ok(Operator::Lt),
            "le" | "lte" => Ok(Operator::Le),
            "in" => Ok(Operator::In),
            "ni" | "not-in" => Ok(Operator::NotIn),
            "contains" => Ok(Operator::Contains),
            "regex" => Ok(Operator::Regex),
            "glob" => Ok(Operator::Glob),
            _ => Err(format!(
                "unknown operator '{}'. Valid operators: eq, ne, gt, ge, lt, le, in, not-in, contains, regex, glob",
                s
            )),
        }
    }
}

/// Compares a resolved attribute value against an expected value.
pub trait ValueMatcher {
    /// Whether `value` satisfies `expected` under the operator named `op`.
    ///
    /// Unknown operators never match.
    fn compare(&self, value: Option<&Value>, expected: &Value, op: &str) -> bool;

    /// Whether `op` names an operator this matcher understands.
    fn supports(&self, op: &str) -> bool;
}

/// The built-in matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueMatcher;

impl DefaultValueMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl ValueMatcher for DefaultValueMatcher {
    fn compare(&self, value: Option<&Value>, expected: &Value, op: &str) -> bool {
        if let Some(special) = expected.as_str() {
            match special {
                "absent" => return value.is_none(),
                "present" | "not-null" => return value.is_some(),
                "empty" => return value.map_or(true, is_empty),
                _ => {}
            }
        }

        let Ok(operator) = op.parse::<Operator>() else {
            tracing::warn!("unknown comparison operator '{}'", op);
            return false;
        };

        let Some(value) = value else {
            return matches!(operator, Operator::Ne | Operator::NotIn);
        };

        match operator {
            Operator::Eq => values_equal(value, expected),
            Operator::Ne => !values_equal(value, expected),
            Operator::Gt => order(value, expected) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                order(value, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => order(value, expected) == Some(Ordering::Less),
            Operator::Le => matches!(
                order(value, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => list_contains(expected, value),
            Operator::NotIn => !list_contains(expected, value),
            Operator::Contains => match value {
                Value::Array(_) => list_contains(value, expected),
                Value::String(s) => expected.as_str().is_some_and(|e| s.contains(e)),
                _ => false,
            },
            Operator::Regex => match (value.as_str(), expected.as_str()) {
                (Some(text), Some(pattern)) => match Regex::new(pattern) {
                    Ok(re) => re.is_match(text),
                    Err(e) => {
                        tracing::warn!("invalid regex '{}': {}", pattern, e);
                        false
                    }
                },
                _ => false,
            },
            // Invalid patterns never match (fail-closed).
            Operator::Glob => match (value.as_str(), expected.as_str()) {
                (Some(text), Some(pattern)) => {
                    Pattern::new(pattern).is_ok_and(|p| p.matches(text))
                }
                _ => false,
            },
        }
    }

    fn supports(&self, op: &str) -> bool {
        op.parse::<Operator>().is_ok()
    }
}

/// Expected values with a meaning of their own under every operator.
fn is_special(expected: &Value) -> bool {
    matches!(
        expected.as_str(),
        Some("absent" | "present" | "not-null" | "empty")
    )
}

/// An expected value and operator as written in a policy, with a `regex`
/// pattern compiled once when the filter is built.
#[derive(Debug, Clone)]
pub struct Expectation {
    value: Value,
    op: String,
    pattern: Option<Regex>,
}

impl Expectation {
    /// Compile `value` when `op` is `regex`. An unknown `op` is left for the
    /// caller to reject.
    pub fn new(value: Value, op: impl Into<String>) -> Result<Self, PolicyError> {
        let op = op.into();
        let pattern = match (op.parse::<Operator>(), value.as_str()) {
            (Ok(Operator::Regex), Some(pattern)) if !is_special(&value) => {
                Some(Regex::new(pattern)?)
            }
            _ => None,
        };
        Ok(Self { value, op, pattern })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    /// Whether `actual` satisfies this expectation.
    ///
    /// A compiled pattern is applied directly; everything else goes through
    /// `matcher`.
    pub fn test(&self, actual: Option<&Value>, matcher: &dyn ValueMatcher) -> bool {
        match &self.pattern {
            Some(pattern) => actual
                .and_then(Value::as_str)
                .is_some_and(|text| pattern.is_match(text)),
            None => matcher.compare(actual, &self.value, &self.op),
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A number, or a string that parses as one.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            }
        }
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn list_contains(list: &Value, item: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|v| values_equal(v, item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmp(value: Option<Value>, expected: Value, op: &str) -> bool {
        DefaultValueMatcher.compare(value.as_ref(), &expected, op)
    }

    #[test]
    fn cardinality_operators() {
        assert!(cmp(Some(json!(2)), json!(2), "eq"));
        assert!(cmp(Some(json!(2)), json!(1), "gt"));
        assert!(!cmp(Some(json!(2)), json!(3), "eq"));
        assert!(cmp(Some(json!(2)), json!(3), "ne"));
        assert!(cmp(Some(json!(2)), json!(2), "ge"));
        assert!(cmp(Some(json!(2)), json!(3), "lt"));
        assert!(cmp(Some(json!(2)), json!(2), "le"));
        assert!(!cmp(Some(json!(2)), json!(2), "lt"));
    }

    #[test]
    fn special_values() {
        assert!(cmp(None, json!("absent"), "eq"));
        assert!(!cmp(Some(json!("x")), json!("absent"), "eq"));
        assert!(cmp(Some(json!("x")), json!("present"), "eq"));
        assert!(cmp(Some(json!("")), json!("empty"), "eq"));
        assert!(cmp(Some(json!([])), json!("empty"), "eq"));
        assert!(cmp(None, json!("empty"), "eq"));
        assert!(!cmp(Some(json!([1])), json!("empty"), "eq"));
        assert!(cmp(Some(json!(false)), json!("not-null"), "eq"));
    }

    #[test]
    fn missing_value_only_matches_negative_operators() {
        assert!(!cmp(None, json!("AES256"), "eq"));
        assert!(cmp(None, json!("AES256"), "ne"));
        assert!(cmp(None, json!(["a"]), "not-in"));
        assert!(!cmp(None, json!(1), "gt"));
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert!(cmp(Some(json!(1.0)), json!(1), "eq"));
        assert!(cmp(Some(json!("30")), json!(7), "gt"));
        assert!(!cmp(Some(json!(true)), json!(1), "eq"));
    }

    #[test]
    fn collection_and_pattern_operators() {
        assert!(cmp(Some(json!("private")), json!(["private", "log-delivery-write"]), "in"));
        assert!(cmp(Some(json!("public-read")), json!(["private"]), "not-in"));
        assert!(cmp(Some(json!(["a", "b"])), json!("b"), "contains"));
        assert!(cmp(Some(json!("arn:aws:kms:us-east-1")), json!("kms"), "contains"));
        assert!(cmp(Some(json!("prod-logs")), json!("^prod-"), "regex"));
        assert!(cmp(Some(json!("prod-logs")), json!("prod-*"), "glob"));
        assert!(!cmp(Some(json!("prod-logs")), json!("[invalid"), "glob"));
    }

    #[test]
    fn unknown_operator_never_matches() {
        assert!(!cmp(Some(json!(1)), json!(1), "approximately"));
        assert!(!DefaultValueMatcher.supports("approximately"));
        assert!(DefaultValueMatcher.supports("gte"));
        assert!("bogus".parse::<Operator>().is_err());
    }

    #[test]
    fn expectation_precompiles_regex_and_agrees_with_matcher() {
        let expectation = Expectation::new(json!("^prod-"), "regex").unwrap();
        assert!(expectation.pattern.is_some());
        for actual in [Some(json!("prod-logs")), Some(json!("dev-logs")), Some(json!(3)), None] {
            assert_eq!(
                expectation.test(actual.as_ref(), &DefaultValueMatcher),
                cmp(actual.clone(), json!("^prod-"), "regex"),
                "disagreement on {:?}",
                actual
            );
        }

        let absent = Expectation::new(json!("absent"), "regex").unwrap();
        assert!(absent.pattern.is_none());
        assert!(absent.test(None, &DefaultValueMatcher));

        let plain = Expectation::new(json!("private"), "eq").unwrap();
        assert!(plain.pattern.is_none());
        assert!(plain.test(Some(&json!("private")), &DefaultValueMatcher));
    }

    #[test]
    fn expectation_rejects_invalid_regex() {
        match Expectation::new(json!("[unclosed"), "regex") {
            Err(PolicyError::Regex(_)) => {}
            other => panic!("expected Regex error, got {:?}", other),
        }
    }
}
