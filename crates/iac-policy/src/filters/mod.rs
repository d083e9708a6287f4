//! filters - The filter chain applied to each policy's resources.
//!
//! Every filter takes the current resource list and returns the subset that
//! matches. Filters are built from policy data by a [`FilterRegistry`]
//! instance that is created per run and passed explicitly into policy
//! compilation; there is no process-wide registry.
//!
//! Built-in filter types:
//! - **value**: compare one attribute of the resource itself
//! - **and** / **or** / **not**: compose filter lists
//! - **link**: multi-hop traversal through the reference index
//! - **related_resource**: single-hop join against one related type

use std::collections::BTreeMap;
use std::fmt;

use iac_graph::{IndexedGraph, Resource};
use serde_json::{Map, Value};

use crate::error::PolicyError;
use crate::matcher::ValueMatcher;

pub mod boolean;
pub mod link;
pub mod related;
pub mod value;

pub use boolean::{BooleanFilter, BooleanOp};
pub use link::{LinkConfig, LinkFilter};
pub use related::{RelatedLookup, RelatedResourceConfig, RelatedResourceFilter};
pub use value::{ValueFilter, ValueFilterConfig};

/// Everything a filter can consult while processing resources.
pub struct FilterContext<'a> {
    /// The graph, with its reference index already complete.
    pub graph: &'a IndexedGraph,
    /// Comparison semantics for attribute tests.
    pub matcher: &'a dyn ValueMatcher,
}

/// One step of a policy's filter chain.
pub trait Filter: fmt::Debug {
    /// The filter type name (e.g. "link").
    fn name(&self) -> &str;

    /// Return the resources that pass this filter, in input order.
    fn process(&self, resources: Vec<Resource>, ctx: &FilterContext<'_>) -> Vec<Resource>;
}

/// Builds a filter from its policy data. The registry is passed along so
/// composite filters can build their children.
pub type FilterFactory = fn(&Map<String, Value>, &FilterRegistry) -> Result<Box<dyn Filter>, PolicyError>;

/// Maps filter type names to factories.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in filter type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("value", value::build);
        registry.register("and", boolean::build);
        registry.register("or", boolean::build);
        registry.register("not", boolean::build);
        registry.register("link", link::build);
        registry.register("related_resource", related::build);
        registry
    }

    /// Register (or replace) a filter type.
    pub fn register(&mut self, name: &str, factory: FilterFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered filter type names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build one filter from its policy data.
    ///
    /// Accepted shapes:
    /// - `{type: <name>, ...}`
    /// - `{or: [...]}`, `{and: [...]}`, `{not: [...]}`
    /// - `{key: ..., value: ...}` without a type, read as a value filter
    /// - `{<key>: <value>}` shorthand for an equality value filter
    pub fn parse(&self, data: &Value) -> Result<Box<dyn Filter>, PolicyError> {
        let map = data
            .as_object()
            .ok_or_else(|| PolicyError::invalid_filter("filter", "filter must be a mapping"))?;

        let name = match map.get("type") {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(PolicyError::invalid_filter(
                    "filter",
                    format!("'type' must be a string, got {}", other),
                ))
            }
            None => match boolean_key(map) {
                Some(op) => op,
                None if map.len() == 1 || map.contains_key("key") => "value",
                None => {
                    return Err(PolicyError::invalid_filter(
                        "filter",
                        "expected 'type', a boolean block, or a single {key: value} pair",
                    ))
                }
            },
        };

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PolicyError::UnknownFilter {
                name: name.to_string(),
            })?;
        factory(map, self)
    }

    /// Build a filter chain, failing on the first invalid entry.
    pub fn parse_all(&self, data: &[Value]) -> Result<Vec<Box<dyn Filter>>, PolicyError> {
        data.iter().map(|d| self.parse(d)).collect()
    }
}

/// `Some("or")` for `{or: [...]}` and friends.
fn boolean_key(map: &Map<String, Value>) -> Option<&'static str> {
    if map.len() != 1 {
        return None;
    }
    ["and", "or", "not"]
        .into_iter()
        .find(|op| map.get(*op).is_some_and(Value::is_array))
}

/// Run a chain of filters in order, stopping early once nothing is left.
pub fn apply_chain(
    filters: &[Box<dyn Filter>],
    mut resources: Vec<Resource>,
    ctx: &FilterContext<'_>,
) -> Vec<Resource> {
    for filter in filters {
        if resources.is_empty() {
            break;
        }
        resources = filter.process(resources, ctx);
    }
    resources
}
