//! # iac-policy
//!
//! Policy loading and the filter engine for infrastructure-as-code
//! evaluation.
//!
//! A [`PolicyStore`] reads YAML policy files into [`PolicyDefinition`]s.
//! [`Policy::compile`] expands `{name}` [`Variables`], validates the
//! definition, and builds its filter chain through an explicit
//! [`FilterRegistry`]. Filters run against an [`iac_graph::IndexedGraph`],
//! so relational filters (`link`, `related_resource`) always see a
//! complete reference index.
//!
//! ## Key invariants
//!
//! - **Validation is per policy**: every compile error is wrapped in
//!   [`PolicyError::Invalid`] naming the policy, so a caller can report it
//!   and carry on with the rest.
//! - **Filters never fail at evaluation time**: configuration problems
//!   (bad operators, bad regexes, bad shapes) are rejected at compile time.
//! - **Missing relations are not errors**: an absent related type or an
//!   unindexed id means "no related resources".
//! - **Invalid glob patterns never match** (fail-closed).

pub mod error;
pub mod filters;
pub mod matcher;
pub mod policy;
pub mod store;
pub mod variables;

pub use error::PolicyError;
pub use filters::{apply_chain, Filter, FilterContext, FilterFactory, FilterRegistry};
pub use matcher::{DefaultValueMatcher, Operator, ValueMatcher};
pub use policy::{strip_provider_prefix, Policy, PolicyDefinition, TypePatterns};
pub use store::PolicyStore;
pub use variables::Variables;
