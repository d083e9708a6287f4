// runner.rs - CollectionRunner: one full evaluation of a policy set.
//
// run():
//   1. provider.match_dir   -> SourceNotFound when nothing matches
//   2. provider.parse       -> IndexedGraph (index complete on return)
//   3. PolicyStore::load    -> NoPolicies when empty
//   4. Policy::compile each -> failures go to on_policy_error; siblings run
//   5. for each (type, resources) in the graph, for each policy whose
//      patterns match the type, run the filter chain; non-empty results
//      go to on_results
//
// Each pass re-queries the graph, so resources are freshly wrapped and
// annotations from one run never show up in the next.

use std::sync::Arc;

use glob::Pattern;
use iac_graph::{IndexedGraph, Resource};
use iac_policy::{
    DefaultValueMatcher, FilterContext, FilterRegistry, Policy, PolicyDefinition, PolicyStore,
    ValueMatcher, Variables,
};

use crate::config::RunConfig;
use crate::error::RunnerError;
use crate::output::Reporter;
use crate::provider::ProviderRegistry;

/// One resource matched by one policy.
#[derive(Debug, Clone)]
pub struct PolicyResourceResult {
    pub resource: Resource,
    pub policy: Arc<PolicyDefinition>,
}

/// All findings of a run, in evaluation order.
pub type ResultSet = Vec<PolicyResourceResult>;

/// Outcome of [`CollectionRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Whether any policy matched any resource.
    pub found: bool,
    pub result_count: usize,
    /// Policies that compiled and were evaluated.
    pub policy_count: usize,
    /// Policies left out because they failed expansion or validation.
    pub policy_errors: usize,
    pub resource_count: usize,
}

impl RunSummary {
    /// Process exit code for the run: 1 when findings are present, else 0.
    ///
    /// Fatal errors never produce a summary; callers map those to 2.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.found)
    }
}

/// Whether `policy` applies to resources of `resource_type`.
///
/// Every pattern is tried, with its provider prefix stripped. Invalid
/// patterns never match (fail-closed).
pub fn match_type(resource_type: &str, policy: &Policy) -> bool {
    policy
        .resource_patterns()
        .into_iter()
        .any(|pattern| match Pattern::new(pattern) {
            Ok(p) => p.matches(resource_type),
            Err(_) => false,
        })
}

/// Drives one evaluation.
pub struct CollectionRunner {
    config: RunConfig,
    providers: ProviderRegistry,
    filters: FilterRegistry,
    matcher: Box<dyn ValueMatcher>,
}

impl CollectionRunner {
    /// A runner with the built-in providers, filters, and matcher.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            providers: ProviderRegistry::with_defaults(),
            filters: FilterRegistry::with_defaults(),
            matcher: Box::new(DefaultValueMatcher::new()),
        }
    }

    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn ValueMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Find, parse, and index the sources.
    pub fn load_graph(&self) -> Result<IndexedGraph, RunnerError> {
        let provider = self.providers.get(&self.config.provider)?;
        let source_dir = self.config.source_dir.as_path();
        if provider.match_dir(source_dir)?.is_empty() {
            return Err(RunnerError::SourceNotFound {
                provider: provider.name().to_string(),
                dir: source_dir.display().to_string(),
            });
        }
        provider.parse(source_dir)
    }

    /// Variables for `{name}` placeholders: built-ins, then user values.
    pub fn variables(&self) -> Variables {
        let mut vars = Variables::for_run(&self.config.source_dir, &self.config.policy_dir);
        vars.extend(self.config.variables.clone());
        vars
    }

    /// Load and compile the policy set.
    ///
    /// Returns the policies that compiled and the number that did not. Each
    /// failure is logged and handed to `reporter`.
    pub fn load_policies(
        &self,
        reporter: &mut dyn Reporter,
    ) -> Result<(Vec<Policy>, usize), RunnerError> {
        let policy_dir = self.config.policy_dir.as_path();
        let definitions = PolicyStore::load_dir(policy_dir)?;
        if definitions.is_empty() {
            tracing::warn!("no policies found in {}", policy_dir.display());
            return Err(RunnerError::NoPolicies {
                dir: policy_dir.display().to_string(),
            });
        }
        Ok(self.compile(definitions, reporter))
    }

    fn compile(
        &self,
        definitions: Vec<PolicyDefinition>,
        reporter: &mut dyn Reporter,
    ) -> (Vec<Policy>, usize) {
        let vars = self.variables();
        let mut policies = Vec::new();
        let mut errors = 0;
        for definition in definitions {
            match Policy::compile(definition, &self.filters, &vars) {
                Ok(policy) => policies.push(policy),
                Err(e) => {
                    tracing::warn!("skipping policy: {}", e);
                    reporter.on_policy_error(&e);
                    errors += 1;
                }
            }
        }
        (policies, errors)
    }

    /// Dispatch every policy against every matching resource type.
    pub fn evaluate(
        &self,
        graph: &IndexedGraph,
        policies: &[Policy],
        reporter: &mut dyn Reporter,
    ) -> ResultSet {
        let ctx = FilterContext {
            graph,
            matcher: self.matcher.as_ref(),
        };
        let mut results = ResultSet::new();

        for (resource_type, group) in graph.get_resources_by_type(&[]) {
            let resources = group.into_vec();
            for policy in policies {
                if !match_type(&resource_type, policy) {
                    continue;
                }
                let matched = policy.run_filters(resources.clone(), &ctx);
                if matched.is_empty() {
                    continue;
                }
                tracing::debug!(
                    "policy '{}' matched {} {} resource(s)",
                    policy.name(),
                    matched.len(),
                    resource_type
                );
                let batch: Vec<PolicyResourceResult> = matched
                    .into_iter()
                    .map(|resource| PolicyResourceResult {
                        resource,
                        policy: Arc::clone(policy.definition()),
                    })
                    .collect();
                reporter.on_results(&batch);
                results.extend(batch);
            }
        }
        results
    }

    /// One full evaluation.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<RunSummary, RunnerError> {
        let graph = self.load_graph()?;
        let (policies, policy_errors) = self.load_policies(reporter)?;

        tracing::info!(
            "evaluating {} policies against {} resources from {}",
            policies.len(),
            graph.len(),
            self.config.source_dir.display()
        );
        reporter.on_execution_started(&policies);
        let results = self.evaluate(&graph, &policies, reporter);
        reporter.on_execution_ended()?;

        Ok(RunSummary {
            found: !results.is_empty(),
            result_count: results.len(),
            policy_count: policies.len(),
            policy_errors,
            resource_count: graph.len(),
        })
    }
}
