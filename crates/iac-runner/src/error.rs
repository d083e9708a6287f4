// error.rs - Error types for an evaluation run.

use iac_graph::GraphError;
use iac_policy::PolicyError;
use thiserror::Error;

/// Errors that abort a whole run.
///
/// Per-policy validation failures are not in here: they are reported
/// through the reporter and the run continues without that policy.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The provider found no files it understands in the source directory.
    #[error("no {provider} source files found in {dir}")]
    SourceNotFound { provider: String, dir: String },

    /// Every source file the provider found is in a syntax it cannot parse.
    #[error("{dir} holds {skipped} {provider} file(s), none in a format that is parsed ({expected})")]
    UnsupportedSources {
        provider: String,
        dir: String,
        skipped: usize,
        expected: String,
    },

    /// The policy directory holds no policies.
    #[error("no policies found in {dir}")]
    NoPolicies { dir: String },

    /// No provider is registered under this name.
    #[error("unknown provider '{name}'. Available providers: {available}")]
    UnknownProvider { name: String, available: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The run configuration file is not valid TOML or has the wrong shape.
    #[error("invalid config file {path}: {source}")]
    Config {
        path: String,
        source: toml::de::Error,
    },

    /// Parsing the source tree failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Loading the policy set failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A reporter could not render or write its output.
    #[error("output error for {target}: {reason}")]
    Output { target: String, reason: String },
}
