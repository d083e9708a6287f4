// error.rs - Error types for policy loading and validation.

use thiserror::Error;

/// Errors that can occur while loading, expanding, or validating policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A policy file is not valid YAML or does not have the expected shape.
    #[error("invalid policy file {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    /// Two policies share a name.
    #[error("duplicate policy name '{name}'")]
    DuplicatePolicy { name: String },

    /// A policy failed variable expansion or validation; scoped to that policy.
    #[error("policy '{policy}' is invalid: {source}")]
    Invalid {
        policy: String,
        #[source]
        source: Box<PolicyError>,
    },

    /// A required policy field is missing or empty.
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// A filter names a type the registry does not know.
    #[error("unknown filter type '{name}'")]
    UnknownFilter { name: String },

    /// A filter's configuration does not fit its schema.
    #[error("invalid '{filter}' filter: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// A `{name}` placeholder names a variable that was never defined.
    #[error("unknown variable '{{{name}}}'")]
    UnknownVariable { name: String },

    /// A resource-type pattern cannot be parsed as a glob.
    #[error("invalid resource pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A regular expression failed to compile.
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

impl PolicyError {
    /// Scope an error to the named policy.
    pub fn for_policy(self, policy: &str) -> Self {
        match self {
            already @ PolicyError::Invalid { .. } => already,
            other => PolicyError::Invalid {
                policy: policy.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn invalid_filter(filter: &str, reason: impl Into<String>) -> Self {
        PolicyError::InvalidFilter {
            filter: filter.to_string(),
            reason: reason.into(),
        }
    }
}
