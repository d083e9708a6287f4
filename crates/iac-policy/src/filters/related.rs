// related.rs - Single-hop join against one related type.
//
//   - type: related_resource
//     resource_type: aws_s3_bucket_server_side_encryption_configuration
//     key: rule.0.apply_server_side_encryption_by_default.sse_algorithm
//     value: aws:kms
//
// Related resources are found through the reference index by default
// (`match-by: index`), or by reading an attribute path on either side of
// the relation (`match-by: expression`, with an optional `id-expression`).
//
// Matching rules:
//   - a base with no related resources is tested against one placeholder
//     that resolves every key to nothing, so `value: absent` still matches
//   - a base matches if any related resource (or the placeholder) passes
//   - no `key` and no `value`: at least one related resource must exist
//   - no `key` with `value: absent`: no related resource may exist
//   - no `key` with `value: present`: same as no `key` and no `value`
//   - a `key` with no `value`: the key must resolve on some related resource

use iac_graph::{IndexedGraph, Resource};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PolicyError;
use crate::filters::{Filter, FilterContext, FilterRegistry};
use crate::matcher::{Expectation, Operator};

/// How related resources are located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedLookup {
    /// Through the reference index built with the graph.
    Index,
    /// By an attribute path holding the other side's id. `None` uses the
    /// expression the index recorded for the type pair.
    Expression(Option<String>),
}

/// Configuration of a related-resource filter.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedResourceConfig {
    pub related_type: String,
    pub lookup: RelatedLookup,
    pub key: Option<String>,
    pub value: Option<Value>,
    pub op: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RelatedData {
    #[serde(rename = "type")]
    _kind: String,
    resource_type: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    op: Option<String>,
    #[serde(rename = "match-by", default)]
    match_by: Option<String>,
    #[serde(rename = "id-expression", default)]
    id_expression: Option<String>,
}

impl RelatedResourceConfig {
    /// Read the policy form of the filter.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, PolicyError> {
        let data: RelatedData = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| PolicyError::invalid_filter("related_resource", e.to_string()))?;
        let lookup = match (data.match_by.as_deref(), data.id_expression) {
            (None | Some("index"), None) => RelatedLookup::Index,
            (None | Some("expression"), Some(expr)) => RelatedLookup::Expression(Some(expr)),
            (Some("expression"), None) => RelatedLookup::Expression(None),
            (Some("index"), Some(_)) => {
                return Err(PolicyError::invalid_filter(
                    "related_resource",
                    "'id-expression' needs 'match-by: expression'",
                ))
            }
            (Some(other), _) => {
                return Err(PolicyError::invalid_filter(
                    "related_resource",
                    format!("unknown match-by '{}'; expected index or expression", other),
                ))
            }
        };
        Ok(Self {
            related_type: data.resource_type,
            lookup,
            key: data.key,
            value: data.value,
            op: data.op.unwrap_or_else(|| "eq".to_string()),
        })
    }
}

/// What a base resource's related set must satisfy.
#[derive(Debug, Clone)]
enum Clause {
    /// At least one related resource exists.
    Exists,
    /// No related resource exists.
    Missing,
    /// Some candidate's `key` satisfies the expectation.
    Attribute { key: String, expected: Expectation },
}

#[derive(Debug, Clone)]
pub struct RelatedResourceFilter {
    config: RelatedResourceConfig,
    clause: Clause,
}

impl RelatedResourceFilter {
    pub fn new(config: RelatedResourceConfig) -> Result<Self, PolicyError> {
        if config.related_type.trim().is_empty() {
            return Err(PolicyError::invalid_filter(
                "related_resource",
                "'resource_type' must not be empty",
            ));
        }
        config
            .op
            .parse::<Operator>()
            .map_err(|reason| PolicyError::invalid_filter("related_resource", reason))?;
        if let RelatedLookup::Expression(Some(expr)) = &config.lookup {
            if expr.trim().is_empty() {
                return Err(PolicyError::invalid_filter(
                    "related_resource",
                    "'id-expression' must not be empty",
                ));
            }
        }

        let clause = match (&config.key, &config.value) {
            (Some(key), _) if key.trim().is_empty() => {
                return Err(PolicyError::invalid_filter(
                    "related_resource",
                    "'key' must not be empty",
                ))
            }
            (Some(key), Some(value)) => Clause::Attribute {
                key: key.clone(),
                expected: Expectation::new(value.clone(), config.op.clone())?,
            },
            (Some(key), None) => Clause::Attribute {
                key: key.clone(),
                expected: Expectation::new(
                    Value::String("present".to_string()),
                    config.op.clone(),
                )?,
            },
            (None, None) => Clause::Exists,
            (None, Some(value)) => match value.as_str() {
                Some("absent") => Clause::Missing,
                Some("present") | Some("not-null") => Clause::Exists,
                _ => {
                    return Err(PolicyError::invalid_filter(
                        "related_resource",
                        "a 'value' other than absent/present needs a 'key'",
                    ))
                }
            },
        };
        Ok(Self { config, clause })
    }

    pub fn config(&self) -> &RelatedResourceConfig {
        &self.config
    }

    /// Related resources of `base`. Empty when there are none.
    pub fn get_related(&self, base: &Resource, graph: &IndexedGraph) -> Vec<Resource> {
        let related_type = self.config.related_type.as_str();
        match &self.config.lookup {
            RelatedLookup::Index => graph.get_refs(base, related_type),
            RelatedLookup::Expression(explicit) => {
                let refs = graph.references();
                // Reverse: the related resource names the base.
                let reverse = explicit.as_deref().or_else(|| {
                    refs.id_expression(related_type, &base.resource_type)
                });
                // Forward: the base names the related resource.
                let forward = explicit.as_deref().or_else(|| {
                    refs.id_expression(&base.resource_type, related_type)
                });
                let target = forward.and_then(|expr| expression_id(base, expr));

                graph
                    .resources_of_type(related_type)
                    .into_iter()
                    .filter(|candidate| {
                        let names_base = reverse
                            .and_then(|expr| expression_id(candidate, expr))
                            .is_some_and(|id| id == base.id);
                        let named_by_base = target.as_deref() == Some(candidate.id.as_str());
                        names_base || named_by_base
                    })
                    .collect()
            }
        }
    }

    fn matches(&self, related: &[Resource], ctx: &FilterContext<'_>) -> bool {
        match &self.clause {
            Clause::Exists => !related.is_empty(),
            Clause::Missing => related.is_empty(),
            Clause::Attribute { key, expected } => {
                if related.is_empty() {
                    // The "no related resource" placeholder.
                    return expected.test(None, ctx.matcher);
                }
                related.iter().any(|candidate| {
                    let actual = candidate.lookup(key);
                    expected.test(actual.as_ref(), ctx.matcher)
                })
            }
        }
    }
}

/// The id held at `expr` on `resource`: a reference's target id, or a plain
/// string. Top-level and nested paths resolve the same way.
fn expression_id(resource: &Resource, expr: &str) -> Option<String> {
    match resource.lookup(expr)? {
        Value::String(id) => Some(id),
        Value::Object(reference) => reference
            .get("reference_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

impl Filter for RelatedResourceFilter {
    fn name(&self) -> &str {
        "related_resource"
    }

    fn process(&self, resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        if !ctx.graph.has_type(&self.config.related_type) {
            tracing::debug!(
                "no '{}' resources in the graph; testing every base against the placeholder",
                self.config.related_type
            );
        }
        resources
            .into_iter()
            .filter(|base| {
                let related = self.get_related(base, ctx.graph);
                self.matches(&related, ctx)
            })
            .collect()
    }
}

pub(crate) fn build(
    data: &Map<String, Value>,
    _registry: &FilterRegistry,
) -> Result<Box<dyn Filter>, PolicyError> {
    let config = RelatedResourceConfig::from_map(data)?;
    Ok(Box::new(RelatedResourceFilter::new(config)?))
}
