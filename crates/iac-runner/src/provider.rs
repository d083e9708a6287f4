// provider.rs - Providers turn a source directory into an indexed graph.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use iac_graph::{IndexedGraph, ResourceGraph, SourceParser, TfJsonParser};

use crate::error::RunnerError;

/// Recognizes and parses one kind of IaC source tree.
pub trait Provider {
    /// Provider name, as used in policy resource prefixes and `--provider`.
    fn name(&self) -> &str;

    /// Source files in `source_dir` this provider recognizes, sorted.
    ///
    /// A missing directory has no matching files.
    fn match_dir(&self, source_dir: &Path) -> Result<Vec<PathBuf>, RunnerError>;

    /// Parse `source_dir` and build its reference index.
    fn parse(&self, source_dir: &Path) -> Result<IndexedGraph, RunnerError>;
}

/// Terraform sources: `*.tf` and `*.tf.json`.
///
/// Only JSON syntax is parsed. HCL files count as Terraform sources for
/// detection but are skipped with a warning; a directory holding nothing
/// but HCL is an error.
#[derive(Debug, Default)]
pub struct TerraformProvider {
    parser: TfJsonParser,
}

impl TerraformProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_hcl(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tf")
}

fn is_tf_json(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(iac_graph::parser::TF_JSON_SUFFIX))
}

impl Provider for TerraformProvider {
    fn name(&self) -> &str {
        "terraform"
    }

    fn match_dir(&self, source_dir: &Path) -> Result<Vec<PathBuf>, RunnerError> {
        if !source_dir.is_dir() {
            return Ok(Vec::new());
        }
        let io_err = |source| RunnerError::Io {
            path: source_dir.display().to_string(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(source_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && (is_hcl(&path) || is_tf_json(&path)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse(&self, source_dir: &Path) -> Result<IndexedGraph, RunnerError> {
        let (skipped, parseable): (Vec<_>, Vec<_>) =
            self.match_dir(source_dir)?.into_iter().partition(|p| is_hcl(p));
        let skipped = skipped.len();
        if skipped > 0 && parseable.is_empty() {
            return Err(RunnerError::UnsupportedSources {
                provider: self.name().to_string(),
                dir: source_dir.display().to_string(),
                skipped,
                expected: format!("*{}", iac_graph::parser::TF_JSON_SUFFIX),
            });
        }
        if skipped > 0 {
            tracing::warn!(
                "skipping {} HCL (.tf) file(s) in {}; only Terraform JSON (.tf.json) is parsed",
                skipped,
                source_dir.display()
            );
        }

        let raw = self.parser.parse(source_dir)?;
        let graph = IndexedGraph::build(ResourceGraph::new(raw, source_dir));
        tracing::debug!("Loaded {} resources", graph.len());
        Ok(graph)
    }
}

/// Providers available to a run, by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `terraform` provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TerraformProvider::new()));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Provider, RunnerError> {
        self.providers
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| RunnerError::UnknownProvider {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
