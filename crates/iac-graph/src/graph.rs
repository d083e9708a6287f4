// graph.rs - Type-partitioned view over a parsed source tree.
//
// `ResourceGraph::get_resources_by_type` is the query phase: a lazy stream
// of `(type_name, resources)` that wraps raw items as it goes. Each call
// starts a new stream, so the graph can be drained any number of times.
//
// `IndexedGraph::build` is the indexing phase. It consumes a graph, builds
// the complete `ReferenceIndex` from it, and only then hands back something
// relational filters can use. A half-built index is unrepresentable.

use std::collections::{btree_map, BTreeMap};
use std::path::{Path, PathBuf};

use crate::index::ReferenceIndex;
use crate::raw::{RawGraph, RawResource, RawTypeEntry};
use crate::resource::Resource;

/// The resources yielded for one type name.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceGroup {
    /// An ordinary resource type or data-source sub-type.
    Many(Vec<Resource>),
    /// A singleton pseudo-resource (`locals`, `moved`, `terraform`).
    Single(Resource),
}

impl ResourceGroup {
    pub fn len(&self) -> usize {
        match self {
            ResourceGroup::Many(items) => items.len(),
            ResourceGroup::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        match self {
            ResourceGroup::Many(items) => items.iter(),
            ResourceGroup::Single(item) => std::slice::from_ref(item).iter(),
        }
    }

    /// Flatten into a list; a singleton becomes a one-element list.
    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            ResourceGroup::Many(items) => items,
            ResourceGroup::Single(item) => vec![item],
        }
    }
}

/// Lazily-produced, restartable view over a parsed source tree.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    raw: RawGraph,
    src_dir: PathBuf,
}

impl ResourceGraph {
    pub fn new(raw: RawGraph, src_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw,
            src_dir: src_dir.into(),
        }
    }

    /// The directory the graph was parsed from.
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Total number of resources across all types.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Stream `(type_name, resources)` pairs, optionally restricted to `types`.
    ///
    /// `types` is an exact-match filter; an empty slice yields everything.
    /// Data sources come out as `data.<subtype>` and can be selected either
    /// by that full name or by `data` alone.
    pub fn get_resources_by_type(&self, types: &[&str]) -> TypeStream<'_> {
        TypeStream {
            graph: self,
            entries: self.raw.types.iter(),
            data: None,
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Wrap a raw item into a fresh `Resource` of `type_name`.
    fn wrap(&self, type_name: &str, raw: &RawResource) -> Resource {
        let mut meta = raw.meta.clone();
        meta.src_dir = Some(self.src_dir.clone());
        Resource {
            id: raw.identity(),
            resource_type: type_name.to_string(),
            meta,
            attributes: raw.attributes.clone(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Iterator returned by [`ResourceGraph::get_resources_by_type`].
pub struct TypeStream<'a> {
    graph: &'a ResourceGraph,
    entries: btree_map::Iter<'a, String, RawTypeEntry>,
    data: Option<(&'a str, btree_map::Iter<'a, String, Vec<RawResource>>)>,
    types: Vec<String>,
}

impl TypeStream<'_> {
    fn wants(&self, type_name: &str) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| t == type_name)
    }
}

impl<'a> Iterator for TypeStream<'a> {
    type Item = (String, ResourceGroup);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, subtypes)) = self.data.as_mut() {
                let prefix: &'a str = *prefix;
                match subtypes.next() {
                    Some((subtype, items)) => {
                        let type_name = format!("{}.{}", prefix, subtype);
                        if !self.wants(prefix) && !self.wants(&type_name) {
                            continue;
                        }
                        let resources = items
                            .iter()
                            .map(|raw| self.graph.wrap(&type_name, raw))
                            .collect();
                        return Some((type_name, ResourceGroup::Many(resources)));
                    }
                    None => self.data = None,
                }
            }

            let (type_name, entry) = self.entries.next()?;
            match entry {
                RawTypeEntry::Data(subtypes) => {
                    self.data = Some((type_name.as_str(), subtypes.iter()));
                }
                RawTypeEntry::Block(raw) => {
                    if self.wants(type_name) {
                        let resource = self.graph.wrap(type_name, raw);
                        return Some((type_name.clone(), ResourceGroup::Single(resource)));
                    }
                }
                RawTypeEntry::Resources(items) => {
                    if self.wants(type_name) {
                        let resources = items
                            .iter()
                            .map(|raw| self.graph.wrap(type_name, raw))
                            .collect();
                        return Some((type_name.clone(), ResourceGroup::Many(resources)));
                    }
                }
            }
        }
    }
}

/// A resource graph together with its complete reference index.
///
/// Relational filters take `&IndexedGraph`, so they can only run once the
/// indexing pass has finished.
#[derive(Debug, Clone)]
pub struct IndexedGraph {
    graph: ResourceGraph,
    references: ReferenceIndex,
    by_type: BTreeMap<String, BTreeMap<String, Resource>>,
}

impl IndexedGraph {
    /// Index every reference in `graph`, then build the per-type lookup table.
    pub fn build(graph: ResourceGraph) -> Self {
        let references = ReferenceIndex::build(&graph);
        let mut by_type: BTreeMap<String, BTreeMap<String, Resource>> = BTreeMap::new();

        for (type_name, group) in graph.get_resources_by_type(&[]) {
            let slot = by_type.entry(type_name.clone()).or_default();
            for resource in group.into_vec() {
                if slot.contains_key(&resource.id) {
                    tracing::warn!(
                        "duplicate id '{}' in type '{}'; keeping the last declaration",
                        resource.id,
                        type_name
                    );
                }
                slot.insert(resource.id.clone(), resource);
            }
        }

        tracing::debug!(
            "indexed {} resources with {} references",
            graph.len(),
            references.edge_count()
        );

        Self {
            graph,
            references,
            by_type,
        }
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn references(&self) -> &ReferenceIndex {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Query phase: a fresh stream over the underlying graph.
    pub fn get_resources_by_type(&self, types: &[&str]) -> TypeStream<'_> {
        self.graph.get_resources_by_type(types)
    }

    /// Whether the graph declares at least one resource of `resource_type`.
    pub fn has_type(&self, resource_type: &str) -> bool {
        self.by_type
            .get(resource_type)
            .is_some_and(|items| !items.is_empty())
    }

    /// A fresh copy of one resource.
    pub fn resource(&self, resource_type: &str, id: &str) -> Option<Resource> {
        self.by_type.get(resource_type)?.get(id).cloned()
    }

    /// Fresh copies of every resource of `resource_type`; empty when the type is absent.
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<Resource> {
        self.by_type
            .get(resource_type)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One hop: the resources of `target_type` related to `resource`.
    ///
    /// Ids recorded in the index but not declared in the graph (a reference
    /// to something the parser never saw) are skipped.
    pub fn get_refs(&self, resource: &Resource, target_type: &str) -> Vec<Resource> {
        self.references
            .related_ids(&resource.id, target_type)
            .iter()
            .filter_map(|id| {
                let found = self.resource(target_type, id);
                if found.is_none() {
                    tracing::debug!(
                        "reference from '{}' to undeclared {} '{}'",
                        resource.id,
                        target_type,
                        id
                    );
                }
                found
            })
            .collect()
    }
}
