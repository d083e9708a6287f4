//! output - Reporters that receive run events and render findings.
//!
//! - **Terminal**: one human-readable block per finding plus a summary (default)
//! - **JSON**: one machine-readable document per run, for CI

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use iac_policy::{Policy, PolicyError};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::RunnerError;
use crate::runner::PolicyResourceResult;

pub mod json;
pub mod terminal;

/// Output format for a run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminal" | "cli" => Ok(OutputFormat::Terminal),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Invalid output format: '{}'. Valid formats: terminal, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Terminal => write!(f, "terminal"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Where a rendered report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or(OutputTarget::Stdout, OutputTarget::File)
    }

    /// Write a rendered report.
    pub fn write(&self, text: &str) -> Result<(), RunnerError> {
        match self {
            OutputTarget::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes())
                    .and_then(|_| out.flush())
                    .map_err(|e| RunnerError::Output {
                        target: "stdout".to_string(),
                        reason: e.to_string(),
                    })
            }
            OutputTarget::File(path) => fs::write(path, text).map_err(|source| RunnerError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Receives run lifecycle events.
///
/// `on_results` is called once per non-empty policy/resource-type pairing.
/// Reporters collect what they need and write their output in
/// `on_execution_ended`.
pub trait Reporter {
    fn on_execution_started(&mut self, policies: &[Policy]);

    fn on_results(&mut self, results: &[PolicyResourceResult]);

    /// A policy failed expansion or validation and was left out of the run.
    fn on_policy_error(&mut self, error: &PolicyError);

    fn on_execution_ended(&mut self) -> Result<(), RunnerError>;

    /// Render the report collected so far.
    fn render(&self) -> Result<String, RunnerError>;

    /// Reporter name (for logging/debugging).
    fn name(&self) -> &str;
}

/// The policy a validation error belongs to, and the error without that wrapper.
pub(crate) fn split_policy_error(error: &PolicyError) -> (String, String) {
    match error {
        PolicyError::Invalid { policy, source } => (policy.clone(), source.to_string()),
        other => ("<unknown>".to_string(), other.to_string()),
    }
}

/// Get a reporter for the given format, writing to `target`.
pub fn get_reporter(format: OutputFormat, target: OutputTarget) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Terminal => Box::new(terminal::TerminalReporter::new(target)),
        OutputFormat::Json => Box::new(json::JsonReporter::new(target)),
    }
}

/// The reporter a run configuration asks for.
///
/// `output_query` only shapes JSON reports; the terminal reporter ignores it.
pub fn reporter_for(config: &RunConfig) -> Box<dyn Reporter> {
    let target = OutputTarget::from_option(config.output_file.clone());
    match (config.output, &config.output_query) {
        (OutputFormat::Json, Some(query)) => {
            Box::new(json::JsonReporter::new(target).with_query(query.clone()))
        }
        (OutputFormat::Terminal, Some(query)) => {
            tracing::warn!("output query '{}' ignored for terminal output", query);
            get_reporter(config.output, target)
        }
        (format, None) => get_reporter(format, target),
    }
}
