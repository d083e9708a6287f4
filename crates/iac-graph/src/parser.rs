// parser.rs - Source parsers that produce a RawGraph.
//
// `TfJsonParser` reads Terraform JSON syntax (`*.tf.json`). It runs in two
// passes: the first collects the address and identity of every declared
// resource and data source, the second converts block bodies. A string
// attribute whose whole value is one interpolation of a declared address
// (`${aws_s3_bucket.b1.id}`) becomes a `Reference`; anything else, including
// `var.*` and `local.*`, stays a scalar.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::GraphError;
use crate::raw::{RawGraph, RawResource};
use crate::resource::ResourceMeta;
use crate::value::{AttributeValue, Reference};

/// File suffix handled by [`TfJsonParser`].
pub const TF_JSON_SUFFIX: &str = ".tf.json";

/// Matches a string that is exactly one interpolation of `TYPE.NAME` or
/// `data.TYPE.NAME`, optionally indexed and followed by an attribute path.
const REFERENCE_PATTERN: &str =
    r"^\$\{\s*((?:data\.)?[A-Za-z_][A-Za-z0-9_-]*\.[A-Za-z_][A-Za-z0-9_-]*)(?:\[[^\]]*\])?(?:\.[^}]*)?\s*\}$";

/// Named blocks that are neither resources nor data sources.
const NAMED_BLOCKS: &[&str] = &["variable", "output", "module", "provider"];

/// Turns a source directory into a raw attribute tree.
pub trait SourceParser {
    /// Parse every supported file directly inside `source_dir`.
    fn parse(&self, source_dir: &Path) -> Result<RawGraph, GraphError>;
}

/// Parser for Terraform JSON configuration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfJsonParser;

/// A declared resource that references can resolve to.
struct Target {
    name: String,
    target_type: String,
    id: String,
}

impl TfJsonParser {
    pub fn new() -> Self {
        Self
    }

    /// All `*.tf.json` files directly inside `source_dir`, sorted by name.
    pub fn source_files(source_dir: &Path) -> Result<Vec<PathBuf>, GraphError> {
        let entries = fs::read_dir(source_dir).map_err(|source| GraphError::Io {
            path: source_dir.display().to_string(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| GraphError::Io {
                path: source_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let is_tf_json = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TF_JSON_SUFFIX));
            if is_tf_json && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Build a raw graph from already-loaded `(filename, document)` pairs.
    pub fn parse_documents(&self, documents: &[(String, Value)]) -> Result<RawGraph, GraphError> {
        let pattern = Regex::new(REFERENCE_PATTERN)?;

        let mut roots = Vec::with_capacity(documents.len());
        for (filename, document) in documents {
            let root = document
                .as_object()
                .ok_or_else(|| GraphError::InvalidDocument {
                    path: filename.clone(),
                    reason: "top level must be a JSON object".to_string(),
                })?;
            roots.push((filename.as_str(), root));
        }

        // Pass 1: every address a reference could point at.
        let mut targets: HashMap<String, Target> = HashMap::new();
        for (_, root) in &roots {
            for (kind, prefix) in [("resource", ""), ("data", "data.")] {
                let Some(section) = root.get(kind) else {
                    continue;
                };
                for (type_name, name, body) in typed_blocks(section) {
                    let path = format!("{}{}.{}", prefix, type_name, name);
                    let id = body
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| path.clone());
                    targets.insert(
                        path,
                        Target {
                            name: name.to_string(),
                            target_type: format!("{}{}", prefix, type_name),
                            id,
                        },
                    );
                }
            }
        }

        // Pass 2: convert bodies.
        let converter = Converter {
            pattern: &pattern,
            targets: &targets,
        };
        let mut graph = RawGraph::new();
        for (filename, root) in &roots {
            for (key, section) in root.iter() {
                match key.as_str() {
                    "resource" => {
                        for (type_name, name, body) in typed_blocks(section) {
                            let meta = meta(
                                format!("{}.{}", type_name, name),
                                filename,
                                type_name,
                                "resource",
                            );
                            graph.insert_resource(type_name, converter.resource(meta, body));
                        }
                    }
                    "data" => {
                        for (type_name, name, body) in typed_blocks(section) {
                            let meta = meta(
                                format!("data.{}.{}", type_name, name),
                                filename,
                                type_name,
                                "data",
                            );
                            graph.insert_data(type_name, converter.resource(meta, body));
                        }
                    }
                    "locals" | "terraform" => {
                        for body in objects(section) {
                            let meta = meta(key.clone(), filename, key, key);
                            graph.merge_block(key, meta, converter.attributes(body));
                        }
                    }
                    "moved" => {
                        let blocks: Vec<AttributeValue> = objects(section)
                            .into_iter()
                            .map(|body| AttributeValue::Mapping(converter.attributes(body)))
                            .collect();
                        let mut attributes = BTreeMap::new();
                        attributes.insert("blocks".to_string(), AttributeValue::Sequence(blocks));
                        graph.merge_block(key, meta(key.clone(), filename, key, key), attributes);
                    }
                    block if NAMED_BLOCKS.contains(&block) => {
                        for named in objects(section) {
                            for (name, bodies) in named {
                                for body in objects(bodies) {
                                    let meta =
                                        meta(format!("{}.{}", block, name), filename, block, block);
                                    graph.insert_resource(block, converter.resource(meta, body));
                                }
                            }
                        }
                    }
                    other => {
                        tracing::debug!("{}: ignoring unsupported block '{}'", filename, other);
                    }
                }
            }
        }
        Ok(graph)
    }
}

impl SourceParser for TfJsonParser {
    fn parse(&self, source_dir: &Path) -> Result<RawGraph, GraphError> {
        let mut documents = Vec::new();
        for path in Self::source_files(source_dir)? {
            let content = fs::read_to_string(&path).map_err(|source| GraphError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let document: Value =
                serde_json::from_str(&content).map_err(|source| GraphError::Json {
                    path: path.display().to_string(),
                    source,
                })?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push((filename, document));
        }
        tracing::debug!(
            "parsed {} Terraform JSON file(s) from {}",
            documents.len(),
            source_dir.display()
        );
        self.parse_documents(&documents)
    }
}

/// Converts block bodies, resolving whole-string interpolations into references.
struct Converter<'a> {
    pattern: &'a Regex,
    targets: &'a HashMap<String, Target>,
}

impl Converter<'_> {
    fn resource(&self, meta: ResourceMeta, body: &Map<String, Value>) -> RawResource {
        RawResource {
            meta,
            attributes: self.attributes(body),
        }
    }

    fn attributes(&self, body: &Map<String, Value>) -> BTreeMap<String, AttributeValue> {
        body.iter()
            .map(|(k, v)| (k.clone(), self.convert(v)))
            .collect()
    }

    fn convert(&self, value: &Value) -> AttributeValue {
        match value {
            Value::String(s) => match self.resolve(s) {
                Some(reference) => AttributeValue::Reference(reference),
                None => AttributeValue::Scalar(value.clone()),
            },
            Value::Array(items) => {
                AttributeValue::Sequence(items.iter().map(|v| self.convert(v)).collect())
            }
            Value::Object(map) => AttributeValue::Mapping(self.attributes(map)),
            scalar => AttributeValue::Scalar(scalar.clone()),
        }
    }

    fn resolve(&self, text: &str) -> Option<Reference> {
        let address = self.pattern.captures(text)?.get(1)?.as_str();
        let target = self.targets.get(address)?;
        Some(Reference {
            name: target.name.clone(),
            reference_id: target.id.clone(),
            target_type: target.target_type.clone(),
        })
    }
}

fn meta(path: String, filename: &str, label: &str, block: &str) -> ResourceMeta {
    ResourceMeta {
        path,
        filename: filename.to_string(),
        label: label.to_string(),
        block: block.to_string(),
        src_dir: None,
    }
}

/// The objects in a section that may be written as one object or a list of objects.
fn objects(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

/// Flatten `{TYPE: {NAME: BODY}}` into `(TYPE, NAME, BODY)` triples.
fn typed_blocks(section: &Value) -> Vec<(&str, &str, &Map<String, Value>)> {
    let mut blocks = Vec::new();
    for by_type in objects(section) {
        for (type_name, by_name) in by_type {
            for named in objects(by_name) {
                for (name, bodies) in named {
                    for body in objects(bodies) {
                        blocks.push((type_name.as_str(), name.as_str(), body));
                    }
                }
            }
        }
    }
    blocks
}
