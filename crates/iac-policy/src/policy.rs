// policy.rs - Policy definitions and their compiled form.
//
// A `PolicyDefinition` is exactly what the YAML says. A `Policy` is a
// definition that passed variable expansion and validation, together with
// its filter chain. Only `Policy` values are ever evaluated.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use glob::Pattern;
use iac_graph::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;
use crate::filters::{apply_chain, Filter, FilterContext, FilterRegistry};
use crate::variables::Variables;

/// The `resource` field: one type pattern or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypePatterns {
    One(String),
    Many(Vec<String>),
}

impl TypePatterns {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            TypePatterns::One(p) => std::slice::from_ref(p),
            TypePatterns::Many(ps) => ps.as_slice(),
        };
        items.iter().map(String::as_str)
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut String> {
        let items: &mut [String] = match self {
            TypePatterns::One(p) => std::slice::from_mut(p),
            TypePatterns::Many(ps) => ps.as_mut_slice(),
        };
        items.iter_mut()
    }
}

/// Drop the provider namespace: `terraform.aws_s3_bucket` -> `aws_s3_bucket`.
///
/// Everything up to and including the first `.` goes, so
/// `terraform.data.aws_iam_policy_document` becomes
/// `data.aws_iam_policy_document`. A pattern without a `.` is unchanged.
pub fn strip_provider_prefix(pattern: &str) -> &str {
    pattern.split_once('.').map_or(pattern, |(_, rest)| rest)
}

/// A policy as written in a policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default)]
    pub name: String,

    /// Resource type patterns, e.g. `terraform.aws_s3_bucket*`.
    #[serde(default, alias = "resource_type", skip_serializing_if = "Option::is_none")]
    pub resource: Option<TypePatterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub filters: Vec<Value>,

    /// Kept for reporting; never executed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,

    /// The file this policy was loaded from, if any.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

impl PolicyDefinition {
    /// Expand `{name}` placeholders in the filters and resource patterns.
    pub fn expand_variables(&mut self, vars: &Variables) -> Result<(), PolicyError> {
        for filter in &mut self.filters {
            vars.expand_value(filter)?;
        }
        if let Some(patterns) = &mut self.resource {
            for pattern in patterns.iter_mut() {
                *pattern = vars.expand_str(pattern)?;
            }
        }
        Ok(())
    }

    /// Check the definition's shape and build its filter chain.
    pub fn validate(&self, registry: &FilterRegistry) -> Result<Vec<Box<dyn Filter>>, PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::MissingField {
                field: "name".to_string(),
            });
        }
        let patterns = self.resource.as_ref().ok_or_else(|| PolicyError::MissingField {
            field: "resource".to_string(),
        })?;
        let mut count = 0;
        for pattern in patterns.iter() {
            count += 1;
            let stripped = strip_provider_prefix(pattern);
            if stripped.is_empty() {
                return Err(PolicyError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: "empty resource type".to_string(),
                });
            }
            Pattern::new(stripped).map_err(|e| PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        }
        if count == 0 {
            return Err(PolicyError::MissingField {
                field: "resource".to_string(),
            });
        }
        registry.parse_all(&self.filters)
    }
}

/// A validated policy, ready to run.
#[derive(Debug)]
pub struct Policy {
    definition: Arc<PolicyDefinition>,
    filters: Vec<Box<dyn Filter>>,
}

impl Policy {
    /// Expand, validate, and compile a definition. Errors name the policy.
    pub fn compile(
        mut definition: PolicyDefinition,
        registry: &FilterRegistry,
        vars: &Variables,
    ) -> Result<Self, PolicyError> {
        let label = if definition.name.is_empty() {
            definition
                .source_file
                .as_ref()
                .map(|p| format!("<unnamed in {}>", p.display()))
                .unwrap_or_else(|| "<unnamed>".to_string())
        } else {
            definition.name.clone()
        };
        definition
            .expand_variables(vars)
            .map_err(|e| e.for_policy(&label))?;
        let filters = definition.validate(registry).map_err(|e| e.for_policy(&label))?;
        Ok(Self {
            definition: Arc::new(definition),
            filters,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &Arc<PolicyDefinition> {
        &self.definition
    }

    /// Patterns with the provider prefix already removed.
    pub fn resource_patterns(&self) -> Vec<&str> {
        self.definition
            .resource
            .iter()
            .flat_map(TypePatterns::iter)
            .map(strip_provider_prefix)
            .collect()
    }

    pub fn filters(&self) -> &[Box<dyn Filter>] {
        &self.filters
    }

    /// Run the filter chain. A policy with no filters returns every resource.
    pub fn run_filters(&self, resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        apply_chain(&self.filters, resources, ctx)
    }
}
