// link.rs - Multi-hop relational filter.
//
//   - type: link
//     resources: [aws_lb_listener, aws_acm_certificate]
//     attrs:
//       - key_algorithm: RSA_1024
//     count: 1
//     count-op: ge
//
// For each base resource the filter hops through `resources` in order,
// starting from the base itself. Every resource left after the final hop
// is tested against all `attrs` clauses; the survivors are the matches.
// With no `count`, the base matches when there is at least one match.
// Otherwise `count-op` compares the number of matches to `count`.
// Matched resources are recorded on the base under `c7n:<chain>`.

use iac_graph::Resource;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::PolicyError;
use crate::filters::{Filter, FilterContext, FilterRegistry, ValueFilter};
use crate::matcher::Operator;

fn default_count_op() -> String {
    "eq".to_string()
}

/// A single type name or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TypeChain {
    One(String),
    Many(Vec<String>),
}

impl TypeChain {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            TypeChain::One(name) => vec![name.clone()],
            TypeChain::Many(names) => names.clone(),
        }
    }
}

/// Configuration of a link filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    #[serde(rename = "type")]
    pub kind: String,
    /// The type chain, hopped in order.
    pub resources: TypeChain,
    /// Value-filter clauses, all of which a related resource must pass.
    #[serde(default)]
    pub attrs: Vec<Map<String, Value>>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(rename = "count-op", default = "default_count_op")]
    pub count_op: String,
}

#[derive(Debug)]
pub struct LinkFilter {
    chain: Vec<String>,
    attrs: Vec<ValueFilter>,
    count: Option<u64>,
    count_op: String,
}

impl LinkFilter {
    pub fn new(config: LinkConfig) -> Result<Self, PolicyError> {
        let chain = config.resources.to_vec();
        if chain.is_empty() || chain.iter().any(|t| t.trim().is_empty()) {
            return Err(PolicyError::invalid_filter(
                "link",
                "'resources' must name at least one type, and no empty names",
            ));
        }
        config
            .count_op
            .parse::<Operator>()
            .map_err(|reason| PolicyError::invalid_filter("link", reason))?;
        let attrs = config
            .attrs
            .iter()
            .map(ValueFilter::from_map)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            chain,
            attrs,
            count: config.count,
            count_op: config.count_op,
        })
    }

    pub fn type_chain(&self) -> &[String] {
        &self.chain
    }

    /// Where matched related resources are recorded on the base resource.
    pub fn annotation_key(&self) -> String {
        format!("c7n:{}", self.chain.join("-"))
    }

    /// Hop from `resource` through the whole chain.
    fn resolve(&self, resource: &Resource, ctx: &FilterContext<'_>) -> Vec<Resource> {
        let mut working_set = vec![resource.clone()];
        for target_type in &self.chain {
            if working_set.is_empty() {
                break;
            }
            working_set = working_set
                .iter()
                .flat_map(|w| ctx.graph.get_refs(w, target_type))
                .collect();
        }
        working_set
    }

    fn match_attrs(&self, working_set: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        working_set
            .into_iter()
            .filter(|w| self.attrs.iter().all(|f| f.matches(w, ctx.matcher)))
            .collect()
    }

    fn match_cardinality(&self, matched: &[Resource], ctx: &FilterContext<'_>) -> bool {
        match self.count {
            None => !matched.is_empty(),
            Some(count) => ctx.matcher.compare(
                Some(&json!(matched.len())),
                &json!(count),
                &self.count_op,
            ),
        }
    }
}

impl Filter for LinkFilter {
    fn name(&self) -> &str {
        "link"
    }

    fn process(&self, resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        let key = self.annotation_key();
        let mut results = Vec::new();
        for mut resource in resources {
            let matched = self.match_attrs(self.resolve(&resource, ctx), ctx);
            if !self.match_cardinality(&matched, ctx) {
                continue;
            }
            if !matched.is_empty() {
                resource.annotate(key.clone(), matched);
            }
            results.push(resource);
        }
        results
    }
}

pub(crate) fn build(
    data: &Map<String, Value>,
    _registry: &FilterRegistry,
) -> Result<Box<dyn Filter>, PolicyError> {
    let config: LinkConfig = serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| PolicyError::invalid_filter("link", e.to_string()))?;
    Ok(Box::new(LinkFilter::new(config)?))
}
