// resource.rs - A single declared infrastructure object.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::{lookup_path, AttributeValue, Reference};

/// Key under which resource metadata appears in the JSON view of a resource.
pub const META_KEY: &str = "__tfmeta";

/// Where a resource was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Declaration path (e.g. "aws_s3_bucket.b1", "data.aws_iam_policy_document.doc").
    pub path: String,
    /// Source file the block was declared in.
    pub filename: String,
    /// Type label of the block (e.g. "aws_s3_bucket").
    pub label: String,
    /// Block kind ("resource", "data", "locals", "moved", ...).
    pub block: String,
    /// Source directory of the evaluation run, stamped when the resource is wrapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_dir: Option<PathBuf>,
}

/// One resource as seen by policies.
///
/// Everything except `annotations` is fixed once the graph wraps the raw
/// item. Filters record match provenance in `annotations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Identity within `resource_type`.
    pub id: String,
    /// Declared type name, `data.<subtype>`, or a pseudo-type name.
    pub resource_type: String,
    /// Declaration metadata.
    pub meta: ResourceMeta,
    /// Attribute tree.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Filter-attached annotations, keyed by a namespaced key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Vec<Resource>>,
}

impl Resource {
    /// Get a top-level attribute.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Iterate over top-level attributes that point at other resources.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.attributes
            .iter()
            .filter_map(|(key, value)| value.as_reference().map(|r| (key.as_str(), r)))
    }

    /// Attach related resources under an annotation key (replaces any previous value).
    pub fn annotate(&mut self, key: impl Into<String>, related: Vec<Resource>) {
        self.annotations.insert(key.into(), related);
    }

    /// Render the resource as the JSON document that value filters address.
    ///
    /// Contains every attribute, the `id`, and metadata under `__tfmeta`.
    /// An `id` attribute declared in source wins over the computed identity.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::from(self.id.clone()));
        if let Ok(meta) = serde_json::to_value(&self.meta) {
            object.insert(META_KEY.to_string(), meta);
        }
        for (key, value) in &self.attributes {
            object.insert(key.clone(), value.to_json());
        }
        Value::Object(object)
    }

    /// Resolve a dotted attribute path, returning `None` when nothing is there.
    ///
    /// Resolves against the same document as [`Resource::to_json`], but
    /// renders only the top-level attribute the path starts with.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let path = path.trim_start_matches('.');
        if path.is_empty() {
            return lookup_path(&self.to_json(), path).cloned();
        }
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));
        let root = match self.attributes.get(head) {
            Some(value) => value.to_json(),
            None if head == "id" => Value::from(self.id.clone()),
            None if head == META_KEY => serde_json::to_value(&self.meta).ok()?,
            None => return None,
        };
        lookup_path(&root, rest).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket() -> Resource {
        let mut attributes = BTreeMap::new();
        attributes.insert("bucket".to_string(), AttributeValue::from(json!("logs")));
        attributes.insert(
            "versioning".to_string(),
            AttributeValue::from(json!({"enabled": true})),
        );
        Resource {
            id: "aws_s3_bucket.logs".to_string(),
            resource_type: "aws_s3_bucket".to_string(),
            meta: ResourceMeta {
                path: "aws_s3_bucket.logs".to_string(),
                filename: "main.tf.json".to_string(),
                label: "aws_s3_bucket".to_string(),
                block: "resource".to_string(),
                src_dir: None,
            },
            attributes,
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn lookup_reaches_nested_attributes_and_metadata() {
        let r = bucket();
        assert_eq!(r.lookup("versioning.enabled"), Some(json!(true)));
        assert_eq!(r.lookup("id"), Some(json!("aws_s3_bucket.logs")));
        assert_eq!(r.lookup("__tfmeta.filename"), Some(json!("main.tf.json")));
        assert_eq!(r.lookup("encryption"), None);
    }

    #[test]
    fn lookup_agrees_with_the_json_view() {
        let mut r = bucket();
        r.attributes.insert("id".to_string(), AttributeValue::from(json!("declared")));
        let document = r.to_json();
        for path in ["id", "bucket", "versioning", "versioning.enabled", "__tfmeta.block", "missing.deep", ""] {
            assert_eq!(r.lookup(path), lookup_path(&document, path).cloned(), "path {:?}", path);
        }
        assert_eq!(r.lookup("id"), Some(json!("declared")));
    }

    #[test]
    fn references_only_yields_reference_attributes() {
        let mut r = bucket();
        assert_eq!(r.references().count(), 0);
        r.attributes.insert(
            "kms".to_string(),
            AttributeValue::Reference(Reference {
                name: "k".to_string(),
                reference_id: "aws_kms_key.k".to_string(),
                target_type: "aws_kms_key".to_string(),
            }),
        );
        let refs: Vec<_> = r.references().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "kms");
    }

    #[test]
    fn annotate_replaces_previous_value() {
        let mut r = bucket();
        r.annotate("c7n:aws_kms_key", vec![bucket()]);
        r.annotate("c7n:aws_kms_key", vec![]);
        assert!(r.annotations["c7n:aws_kms_key"].is_empty());
    }
}
