// raw.rs - The parser's output: an attribute tree grouped by type.
//
// Ordinary types hold a list of resources. `data` holds one list per
// data-source sub-type. `locals`, `moved`, and `terraform` are single
// pseudo-resources. `BTreeMap` keeps iteration order stable so the graph
// stream can be replayed.

use std::collections::BTreeMap;

use crate::resource::ResourceMeta;
use crate::value::AttributeValue;

/// One resource as produced by a parser, before the graph wraps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResource {
    pub meta: ResourceMeta,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl RawResource {
    /// The identity this resource gets when wrapped.
    ///
    /// A scalar string `id` attribute wins; otherwise the declaration path.
    pub fn identity(&self) -> String {
        self.attributes
            .get("id")
            .and_then(AttributeValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.meta.path.clone())
    }
}

/// Everything declared under one top-level type name.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTypeEntry {
    /// An ordinary resource type.
    Resources(Vec<RawResource>),
    /// Data sources, keyed by sub-type.
    Data(BTreeMap<String, Vec<RawResource>>),
    /// A singleton pseudo-resource (`locals`, `moved`, `terraform`).
    Block(RawResource),
}

/// The complete parsed tree for one source directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGraph {
    pub types: BTreeMap<String, RawTypeEntry>,
}

impl RawGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource of an ordinary type.
    pub fn insert_resource(&mut self, type_name: &str, resource: RawResource) {
        let entry = self
            .types
            .entry(type_name.to_string())
            .or_insert_with(|| RawTypeEntry::Resources(Vec::new()));
        match entry {
            RawTypeEntry::Resources(items) => items.push(resource),
            other => {
                tracing::warn!(
                    "type '{}' already holds a non-resource entry; replacing it",
                    type_name
                );
                *other = RawTypeEntry::Resources(vec![resource]);
            }
        }
    }

    /// Append a data source of the given sub-type under `data`.
    pub fn insert_data(&mut self, subtype: &str, resource: RawResource) {
        let entry = self
            .types
            .entry("data".to_string())
            .or_insert_with(|| RawTypeEntry::Data(BTreeMap::new()));
        match entry {
            RawTypeEntry::Data(subtypes) => subtypes
                .entry(subtype.to_string())
                .or_default()
                .push(resource),
            other => {
                let mut subtypes = BTreeMap::new();
                subtypes.insert(subtype.to_string(), vec![resource]);
                *other = RawTypeEntry::Data(subtypes);
            }
        }
    }

    /// Merge attributes into a singleton block, creating it on first use.
    ///
    /// Later attributes with the same key overwrite earlier ones.
    pub fn merge_block(
        &mut self,
        name: &str,
        meta: ResourceMeta,
        attributes: BTreeMap<String, AttributeValue>,
    ) {
        match self.types.get_mut(name) {
            Some(RawTypeEntry::Block(existing)) => existing.attributes.extend(attributes),
            _ => {
                self.types.insert(
                    name.to_string(),
                    RawTypeEntry::Block(RawResource { meta, attributes }),
                );
            }
        }
    }

    /// Total number of resources, counting each singleton block as one.
    pub fn len(&self) -> usize {
        self.types
            .values()
            .map(|entry| match entry {
                RawTypeEntry::Resources(items) => items.len(),
                RawTypeEntry::Data(subtypes) => subtypes.values().map(Vec::len).sum(),
                RawTypeEntry::Block(_) => 1,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
