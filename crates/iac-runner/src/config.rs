// config.rs - RunConfig: everything one evaluation run needs.
//
// Usually built from CLI flags via `RunConfig::for_dirs`, optionally
// starting from a TOML file:
//
//   source_dir = "infra"
//   policy_dir = "policies"
//   provider = "terraform"
//   output = "json"
//   output_file = "report.json"
//
//   [variables]
//   env = "prod"
//
// Relative paths in a file are resolved against the file's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;
use crate::output::OutputFormat;

fn default_provider() -> String {
    "terraform".to_string()
}

/// Configuration for one evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding the IaC sources.
    #[serde(default)]
    pub source_dir: PathBuf,

    /// Directory holding policy YAML files.
    #[serde(default)]
    pub policy_dir: PathBuf,

    /// Provider name. Default: `terraform`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub output: OutputFormat,

    /// Write the report here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    /// Dotted path projected out of each JSON result, e.g. `resource.bucket`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_query: Option<String>,

    /// User variables for `{name}` placeholders; these override built-ins.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            policy_dir: PathBuf::new(),
            provider: default_provider(),
            output: OutputFormat::default(),
            output_file: None,
            output_query: None,
            variables: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// A config with defaults for everything but the two directories.
    pub fn for_dirs(source_dir: impl AsRef<Path>, policy_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            policy_dir: policy_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let content = fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: RunConfig =
            toml::from_str(&content).map_err(|source| RunnerError::Config {
                path: path.display().to_string(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for dir in [&mut config.source_dir, &mut config.policy_dir] {
            if !dir.as_os_str().is_empty() && dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let Some(file) = config.output_file.as_mut() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        Ok(config)
    }
}
