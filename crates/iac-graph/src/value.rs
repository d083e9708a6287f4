// value.rs - Attribute values carried by parsed resources.
//
// Parsers emit attribute trees as `AttributeValue`s. A pointer to another
// declared resource is its own variant, so reference discovery is a match
// on the variant instead of a probe for marker keys inside mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// A pointer from a resource attribute to another declared resource.
///
/// Example: the `bucket` attribute of an
/// `aws_s3_bucket_server_side_encryption_configuration` that names
/// `aws_s3_bucket.b1` carries
/// `Reference { name: "b1", reference_id: "aws_s3_bucket.b1", target_type: "aws_s3_bucket" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Declared name of the target block.
    pub name: String,
    /// Identity (`Resource::id`) of the target within its type.
    pub reference_id: String,
    /// Type of the target resource (`data.<subtype>` for data sources).
    pub target_type: String,
}

/// One node of a resource's attribute tree.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Null, boolean, number, or string.
    Scalar(Value),
    /// An ordered list of values.
    Sequence(Vec<AttributeValue>),
    /// A nested block or object.
    Mapping(BTreeMap<String, AttributeValue>),
    /// A resolved pointer at another resource in the graph.
    Reference(Reference),
}

impl AttributeValue {
    /// Return the reference carried by this value, if it is one.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            AttributeValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Return the string held by a scalar value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Render the value as plain JSON.
    ///
    /// References become `{name, reference_id, target_type}` objects so that
    /// value filters can address their fields by path.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Scalar(v) => v.clone(),
            AttributeValue::Sequence(items) => {
                Value::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            AttributeValue::Reference(reference) => {
                let mut object = Map::new();
                object.insert("name".to_string(), Value::from(reference.name.clone()));
                object.insert(
                    "reference_id".to_string(),
                    Value::from(reference.reference_id.clone()),
                );
                object.insert(
                    "target_type".to_string(),
                    Value::from(reference.target_type.clone()),
                );
                Value::Object(object)
            }
        }
    }
}

/// Plain JSON converts structurally; strings never become references here.
impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                AttributeValue::Sequence(items.into_iter().map(AttributeValue::from).collect())
            }
            Value::Object(entries) => AttributeValue::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
            scalar => AttributeValue::Scalar(scalar),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Resolve a dotted path (`a.b.0.c`) against a JSON value.
///
/// Numeric segments index into arrays. An empty path returns the value
/// itself. JSON `null` at the end of the path counts as "nothing there".
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_converts_structurally() {
        let value = AttributeValue::from(json!({"tags": {"env": "prod"}, "ports": [80, 443]}));
        match &value {
            AttributeValue::Mapping(entries) => {
                assert!(matches!(entries["tags"], AttributeValue::Mapping(_)));
                assert!(matches!(entries["ports"], AttributeValue::Sequence(_)));
            }
            other => panic!("expected mapping, got {:?}", other),
        }
        assert_eq!(value.to_json(), json!({"tags": {"env": "prod"}, "ports": [80, 443]}));
    }

    #[test]
    fn reference_renders_as_addressable_object() {
        let value = AttributeValue::Reference(Reference {
            name: "b1".to_string(),
            reference_id: "aws_s3_bucket.b1".to_string(),
            target_type: "aws_s3_bucket".to_string(),
        });
        let json = value.to_json();
        assert_eq!(
            lookup_path(&json, "target_type"),
            Some(&json!("aws_s3_bucket"))
        );
        assert!(value.as_reference().is_some());
        assert!(value.as_str().is_none());
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let root = json!({"rule": [{"apply": {"algo": "aws:kms"}}]});
        assert_eq!(lookup_path(&root, "rule.0.apply.algo"), Some(&json!("aws:kms")));
        assert_eq!(lookup_path(&root, "rule.1.apply"), None);
        assert_eq!(lookup_path(&root, "rule.x"), None);
    }

    #[test]
    fn lookup_treats_null_as_missing() {
        let root = json!({"encryption": null});
        assert_eq!(lookup_path(&root, "encryption"), None);
    }
}
