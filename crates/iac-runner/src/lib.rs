//! # iac-runner
//!
//! Evaluation driver for infrastructure-as-code policies.
//!
//! A [`CollectionRunner`] takes a [`RunConfig`], asks a [`Provider`] to
//! find and parse the sources into an indexed graph, loads and compiles
//! the policy set, and dispatches every policy against every resource type
//! its patterns match. Findings and per-policy errors go to a
//! [`Reporter`].
//!
//! ## Key invariants
//!
//! - **Index before evaluation**: providers return an
//!   [`iac_graph::IndexedGraph`], so no filter runs on a partial index.
//! - **Policy errors are contained**: a policy that fails expansion or
//!   validation is reported and skipped; the rest of the run continues.
//! - **Fatal errors are few**: no sources, no policies, unreadable files,
//!   or unparseable sources abort the run with a [`RunnerError`].
//! - **Exit status means findings**: [`RunSummary::exit_code`] is 1 when
//!   anything matched and 0 otherwise.

pub mod config;
pub mod error;
pub mod output;
pub mod provider;
pub mod runner;

pub use config::RunConfig;
pub use error::RunnerError;
pub use output::{get_reporter, reporter_for, OutputFormat, OutputTarget, Reporter};
pub use provider::{Provider, ProviderRegistry, TerraformProvider};
pub use runner::{match_type, CollectionRunner, PolicyResourceResult, ResultSet, RunSummary};
