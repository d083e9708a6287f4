// index.rs - Bidirectional reference index between resources.
//
// Two lookup tables, populated during the single indexing pass:
//
//   resource_index: {<resource_id>: {<related_type>: [<related_id>, ...]}}
//     e.g. "aws_s3_bucket.b1" -> {"aws_s3_bucket_server_side_encryption_configuration": ["...sse1"]}
//          "...sse1"          -> {"aws_s3_bucket": ["aws_s3_bucket.b1"]}
//
//   registry: {<base_type>: {<related_type>: <id_expression>}}
//     e.g. "aws_s3_bucket_server_side_encryption_configuration" -> {"aws_s3_bucket": "bucket"}
//
// The registry is one-directional: the parser only tells us which attribute
// held the reference on the base side.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::ResourceGraph;
use crate::resource::Resource;

/// Adjacency store from resource id to related ids, grouped by related type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceIndex {
    resource_index: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    registry: BTreeMap<String, BTreeMap<String, String>>,
}

impl ReferenceIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete index by draining the graph's type stream once.
    pub fn build(graph: &ResourceGraph) -> Self {
        let mut index = Self::new();
        for (_, group) in graph.get_resources_by_type(&[]) {
            for resource in group.iter() {
                index.discover(resource);
            }
        }
        index
    }

    /// Record every reference attribute on `resource`, with the resource as the base side.
    pub fn discover(&mut self, resource: &Resource) {
        for (attribute, reference) in resource.references() {
            self.add_reference(
                &resource.resource_type,
                &resource.id,
                &reference.target_type,
                &reference.reference_id,
                attribute,
            );
        }
    }

    /// Record one reference from `base_id` to `related_id`, plus its inverse.
    ///
    /// No dedup: calling this twice for the same physical reference records
    /// it twice. The registry entry for the type pair is overwritten.
    pub fn add_reference(
        &mut self,
        base_type: &str,
        base_id: &str,
        related_type: &str,
        related_id: &str,
        id_expression: &str,
    ) {
        self.resource_index
            .entry(base_id.to_string())
            .or_default()
            .entry(related_type.to_string())
            .or_default()
            .push(related_id.to_string());

        self.resource_index
            .entry(related_id.to_string())
            .or_default()
            .entry(base_type.to_string())
            .or_default()
            .push(base_id.to_string());

        self.registry
            .entry(base_type.to_string())
            .or_default()
            .insert(related_type.to_string(), id_expression.to_string());
    }

    /// Ids of resources of `related_type` related to `resource_id`.
    ///
    /// An unknown id or type is an empty slice.
    pub fn related_ids(&self, resource_id: &str, related_type: &str) -> &[String] {
        self.resource_index
            .get(resource_id)
            .and_then(|by_type| by_type.get(related_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All relations recorded for `resource_id`, grouped by related type.
    pub fn relations(&self, resource_id: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.resource_index.get(resource_id)
    }

    /// Whether any relation touches `resource_id`.
    pub fn contains(&self, resource_id: &str) -> bool {
        self.resource_index.contains_key(resource_id)
    }

    /// The attribute a `base_type` resource uses to point at `related_type`.
    pub fn id_expression(&self, base_type: &str, related_type: &str) -> Option<&str> {
        self.registry
            .get(base_type)
            .and_then(|by_type| by_type.get(related_type))
            .map(String::as_str)
    }

    /// Number of recorded forward references (each appears twice in the index).
    pub fn edge_count(&self) -> usize {
        let entries: usize = self
            .resource_index
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum();
        entries / 2
    }

    pub fn is_empty(&self) -> bool {
        self.resource_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSE: &str = "aws_s3_bucket_server_side_encryption_configuration";

    #[test]
    fn add_reference_is_symmetric() {
        let mut index = ReferenceIndex::new();
        index.add_reference(SSE, "sse1", "aws_s3_bucket", "b1", "bucket");

        assert_eq!(index.related_ids("sse1", "aws_s3_bucket"), ["b1"]);
        assert_eq!(index.related_ids("b1", SSE), ["sse1"]);
        assert_eq!(index.edge_count(), 1);
    }

    #[test]
    fn symmetry_holds_for_every_recorded_edge() {
        let mut index = ReferenceIndex::new();
        let edges = [
            ("aws_iam_role_policy_attachment", "att1", "aws_iam_role", "role1"),
            ("aws_iam_role_policy_attachment", "att1", "aws_iam_policy", "pol1"),
            ("aws_lambda_function", "fn1", "aws_iam_role", "role1"),
        ];
        for (bt, bid, rt, rid) in edges {
            index.add_reference(bt, bid, rt, rid, "ref");
        }
        for (bt, bid, rt, rid) in edges {
            assert!(index.related_ids(bid, rt).contains(&rid.to_string()));
            assert!(index.related_ids(rid, bt).contains(&bid.to_string()));
        }
        assert_eq!(
            index.related_ids("role1", "aws_iam_role_policy_attachment"),
            ["att1"]
        );
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let mut index = ReferenceIndex::new();
        index.add_reference(SSE, "sse1", "aws_s3_bucket", "b1", "bucket");
        index.add_reference(SSE, "sse1", "aws_s3_bucket", "b1", "bucket");
        assert_eq!(index.related_ids("b1", SSE).len(), 2);
    }

    #[test]
    fn registry_keeps_last_writer() {
        let mut index = ReferenceIndex::new();
        index.add_reference(SSE, "sse1", "aws_s3_bucket", "b1", "bucket");
        index.add_reference(SSE, "sse2", "aws_s3_bucket", "b2", "bucket_id");
        assert_eq!(index.id_expression(SSE, "aws_s3_bucket"), Some("bucket_id"));
        assert_eq!(index.id_expression("aws_s3_bucket", SSE), None);
    }

    #[test]
    fn lookup_miss_is_empty() {
        let index = ReferenceIndex::new();
        assert!(index.related_ids("missing", "aws_s3_bucket").is_empty());
        assert!(!index.contains("missing"));
        assert!(index.relations("missing").is_none());
        assert!(index.is_empty());
    }
}
