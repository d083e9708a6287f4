// value.rs - Attribute test against the resource itself.
//
//   - type: value
//     key: server_side_encryption_configuration.rule.0.apply.sse_algorithm
//     value: aws:kms
//     op: eq            # default
//
// The shorthand `{key: value}` builds the same filter with `op: eq`.

use iac_graph::Resource;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PolicyError;
use crate::filters::{Filter, FilterContext, FilterRegistry};
use crate::matcher::{Expectation, Operator, ValueMatcher};

fn default_op() -> String {
    "eq".to_string()
}

/// Configuration of a value filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueFilterConfig {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Dotted path into the resource's attributes.
    pub key: String,
    /// Expected value, or one of `absent`, `present`, `not-null`, `empty`.
    pub value: Value,
    /// Comparison operator.
    #[serde(default = "default_op")]
    pub op: String,
}

/// Tests one attribute of each resource.
#[derive(Debug, Clone)]
pub struct ValueFilter {
    config: ValueFilterConfig,
    expected: Expectation,
}

impl ValueFilter {
    /// Build from policy data, accepting either the full or the shorthand form.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, PolicyError> {
        let config = if map.contains_key("type") || map.contains_key("key") {
            serde_json::from_value::<ValueFilterConfig>(Value::Object(map.clone()))
                .map_err(|e| PolicyError::invalid_filter("value", e.to_string()))?
        } else {
            let mut entries = map.iter();
            match (entries.next(), entries.next()) {
                (Some((key, value)), None) => ValueFilterConfig {
                    kind: None,
                    key: key.clone(),
                    value: value.clone(),
                    op: default_op(),
                },
                _ => {
                    return Err(PolicyError::invalid_filter(
                        "value",
                        "shorthand form takes exactly one {key: value} pair",
                    ))
                }
            }
        };
        Self::new(config)
    }

    /// Build from a config, checking it up front so evaluation cannot fail.
    pub fn new(config: ValueFilterConfig) -> Result<Self, PolicyError> {
        if config.key.trim().is_empty() {
            return Err(PolicyError::invalid_filter("value", "'key' must not be empty"));
        }
        let op = config
            .op
            .parse::<Operator>()
            .map_err(|reason| PolicyError::invalid_filter("value", reason))?;
        if matches!(op, Operator::In | Operator::NotIn) && !config.value.is_array() {
            return Err(PolicyError::invalid_filter(
                "value",
                format!("operator '{}' needs a list value", config.op),
            ));
        }
        let expected = Expectation::new(config.value.clone(), config.op.clone())?;
        Ok(Self { config, expected })
    }

    pub fn config(&self) -> &ValueFilterConfig {
        &self.config
    }

    /// Whether `resource` satisfies the test.
    pub fn matches(&self, resource: &Resource, matcher: &dyn ValueMatcher) -> bool {
        let actual = resource.lookup(&self.config.key);
        self.expected.test(actual.as_ref(), matcher)
    }
}

impl Filter for ValueFilter {
    fn name(&self) -> &str {
        "value"
    }

    fn process(&self, mut resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        resources.retain(|r| self.matches(r, ctx.matcher));
        resources
    }
}

pub(crate) fn build(
    data: &Map<String, Value>,
    _registry: &FilterRegistry,
) -> Result<Box<dyn Filter>, PolicyError> {
    Ok(Box::new(ValueFilter::from_map(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::*;
    use crate::matcher::DefaultValueMatcher;
    use serde_json::json;

    fn filter(data: Value) -> Result<ValueFilter, PolicyError> {
        ValueFilter::from_map(data.as_object().unwrap())
    }

    #[test]
    fn full_and_shorthand_forms_agree() {
        let full = filter(json!({"type": "value", "key": "acl", "value": "private"})).unwrap();
        let short = filter(json!({"acl": "private"})).unwrap();
        assert_eq!(full.config().key, short.config().key);
        assert_eq!(full.config().value, short.config().value);
        assert_eq!(full.config().op, "eq");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(filter(json!({"type": "value", "key": "acl"})).is_err());
        assert!(filter(json!({"type": "value", "key": "", "value": 1})).is_err());
        assert!(filter(json!({"type": "value", "key": "a", "value": 1, "op": "near"})).is_err());
        assert!(filter(json!({"type": "value", "key": "a", "value": "(", "op": "regex"})).is_err());
        assert!(filter(json!({"type": "value", "key": "a", "value": "x", "op": "in"})).is_err());
        assert!(filter(json!({"type": "value", "key": "a", "value": 1, "extra": true})).is_err());
    }

    #[test]
    fn process_keeps_matching_resources() {
        let graph = GraphBuilder::new()
            .resource("aws_s3_bucket", "a", json!({"versioning": {"enabled": true}}), &[])
            .resource("aws_s3_bucket", "b", json!({}), &[])
            .build();
        let ctx = FilterContext {
            graph: &graph,
            matcher: &DefaultValueMatcher,
        };
        let absent = filter(json!({"key": "versioning.enabled", "value": "absent"})).unwrap();
        let out = absent.process(of_type(&graph, "aws_s3_bucket"), &ctx);
        assert_eq!(ids(&out), ["aws_s3_bucket.b"]);
    }
}
