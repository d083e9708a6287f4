// boolean.rs - Composition of filter lists.
//
//   - or:
//       - acl: public-read
//       - acl: public-read-write
//   - not:
//       - type: related_resource
//         resource_type: aws_s3_bucket_public_access_block
//
// `and` narrows through its children in order, `or` keeps a resource if any
// child keeps it, and `not` keeps what `and` over its children would drop.
// Output always follows input order.

use std::collections::{BTreeMap, HashSet};

use iac_graph::Resource;
use serde_json::{Map, Value};

use crate::error::PolicyError;
use crate::filters::{apply_chain, Filter, FilterContext, FilterRegistry};

/// Which composition a [`BooleanFilter`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

impl BooleanOp {
    fn as_str(self) -> &'static str {
        match self {
            BooleanOp::And => "and",
            BooleanOp::Or => "or",
            BooleanOp::Not => "not",
        }
    }
}

/// A filter over a list of child filters.
#[derive(Debug)]
pub struct BooleanFilter {
    op: BooleanOp,
    filters: Vec<Box<dyn Filter>>,
}

impl BooleanFilter {
    pub fn new(op: BooleanOp, filters: Vec<Box<dyn Filter>>) -> Self {
        Self { op, filters }
    }

    pub fn op(&self) -> BooleanOp {
        self.op
    }
}

impl Filter for BooleanFilter {
    fn name(&self) -> &str {
        self.op.as_str()
    }

    fn process(&self, resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource> {
        match self.op {
            BooleanOp::And => apply_chain(&self.filters, resources, ctx),
            BooleanOp::Or => {
                let mut kept: BTreeMap<String, Resource> = BTreeMap::new();
                for filter in &self.filters {
                    for r in filter.process(resources.clone(), ctx) {
                        kept.entry(r.id.clone()).or_insert(r);
                    }
                }
                resources
                    .into_iter()
                    .filter_map(|r| kept.remove(&r.id))
                    .collect()
            }
            BooleanOp::Not => {
                let dropped: HashSet<String> = apply_chain(&self.filters, resources.clone(), ctx)
                    .into_iter()
                    .map(|r| r.id)
                    .collect();
                resources
                    .into_iter()
                    .filter(|r| !dropped.contains(&r.id))
                    .collect()
            }
        }
    }
}

pub(crate) fn build(
    data: &Map<String, Value>,
    registry: &FilterRegistry,
) -> Result<Box<dyn Filter>, PolicyError> {
    // `{or: [...]}`, or `{type: or, filters: [...]}`.
    let (op_name, children) = match data.get("type").and_then(Value::as_str) {
        Some(name) => (name, data.get("filters")),
        None => match data.iter().next() {
            Some((name, children)) => (name.as_str(), Some(children)),
            None => return Err(PolicyError::invalid_filter("boolean", "empty block")),
        },
    };
    let op = match op_name {
        "and" => BooleanOp::And,
        "or" => BooleanOp::Or,
        "not" => BooleanOp::Not,
        other => {
            return Err(PolicyError::UnknownFilter {
                name: other.to_string(),
            })
        }
    };
    let children = children
        .and_then(Value::as_array)
        .ok_or_else(|| PolicyError::invalid_filter(op_name, "expected a list of filters"))?;
    if children.is_empty() {
        return Err(PolicyError::invalid_filter(op_name, "filter list must not be empty"));
    }
    Ok(Box::new(BooleanFilter::new(op, registry.parse_all(children)?)))
}
