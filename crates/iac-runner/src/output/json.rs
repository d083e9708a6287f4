//! json.rs - Machine-readable report for CI.
//!
//! One document per run, written when the run ends. `results` follow
//! evaluation order; each carries the full resource as policies saw it,
//! annotations included. With a query, each result is replaced by the
//! value at that dotted path (`null` where there is none).

use chrono::{DateTime, Utc};
use iac_graph::{lookup_path, Resource};
use iac_policy::{Policy, PolicyError};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::RunnerError;
use crate::output::{split_policy_error, OutputTarget, Reporter};
use crate::runner::PolicyResourceResult;

#[derive(Debug, Serialize)]
struct JsonFinding {
    policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    resource_type: String,
    resource_id: String,
    file: String,
    path: String,
    resource: Value,
}

#[derive(Debug, Serialize)]
struct JsonPolicyError {
    policy: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    finished_at: DateTime<Utc>,
    policies: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    result_count: usize,
    results: Vec<Value>,
    policy_errors: &'a [JsonPolicyError],
}

/// The resource's JSON view with filter annotations added under their keys.
fn annotated_json(resource: &Resource) -> Value {
    let mut document = resource.to_json();
    if let Value::Object(map) = &mut document {
        for (key, related) in &resource.annotations {
            map.insert(
                key.clone(),
                Value::Array(related.iter().map(annotated_json).collect()),
            );
        }
    }
    document
}

pub struct JsonReporter {
    target: OutputTarget,
    query: Option<String>,
    run_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    policies: Vec<String>,
    results: Vec<JsonFinding>,
    errors: Vec<JsonPolicyError>,
}

impl JsonReporter {
    pub fn new(target: OutputTarget) -> Self {
        Self {
            target,
            query: None,
            run_id: Uuid::new_v4(),
            started_at: None,
            policies: Vec::new(),
            results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Project each result through a dotted path.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn project(&self, finding: &JsonFinding) -> Result<Value, RunnerError> {
        let document = serde_json::to_value(finding).map_err(serialize_error)?;
        Ok(match &self.query {
            Some(query) => lookup_path(&document, query).cloned().unwrap_or(Value::Null),
            None => document,
        })
    }
}

fn serialize_error(e: serde_json::Error) -> RunnerError {
    RunnerError::Output {
        target: "json".to_string(),
        reason: format!("JSON serialization failed: {}", e),
    }
}

impl Reporter for JsonReporter {
    fn on_execution_started(&mut self, policies: &[Policy]) {
        self.started_at = Some(Utc::now());
        self.policies = policies.iter().map(|p| p.name().to_string()).collect();
    }

    fn on_results(&mut self, results: &[PolicyResourceResult]) {
        self.results.extend(results.iter().map(|r| JsonFinding {
            policy: r.policy.name.clone(),
            description: r.policy.description.clone(),
            resource_type: r.resource.resource_type.clone(),
            resource_id: r.resource.id.clone(),
            file: r.resource.meta.filename.clone(),
            path: r.resource.meta.path.clone(),
            resource: annotated_json(&r.resource),
        }));
    }

    fn on_policy_error(&mut self, error: &PolicyError) {
        let (policy, error) = split_policy_error(error);
        self.errors.push(JsonPolicyError { policy, error });
    }

    fn on_execution_ended(&mut self) -> Result<(), RunnerError> {
        let text = self.render()?;
        self.target.write(&text)
    }

    fn render(&self) -> Result<String, RunnerError> {
        let results = self
            .results
            .iter()
            .map(|f| self.project(f))
            .collect::<Result<Vec<_>, _>>()?;
        let report = JsonReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            policies: &self.policies,
            query: self.query.as_deref(),
            result_count: results.len(),
            results,
            policy_errors: &self.errors,
        };
        let mut json = serde_json::to_string_pretty(&report).map_err(serialize_error)?;
        json.push('\n');
        Ok(json)
    }

    fn name(&self) -> &str {
        "json"
    }
}
