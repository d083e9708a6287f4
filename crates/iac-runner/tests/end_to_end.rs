// end_to_end.rs - Integration tests for a full evaluation run.
//
// Each test writes real Terraform JSON sources and policy YAML into temp
// directories and runs the CollectionRunner over them:
//   1. provider finds and parses the sources, building the reference index
//   2. policies load, expand, and validate
//   3. policies dispatch by resource type; findings reach the reporter

use std::fs;
use std::path::Path;

use iac_policy::{Policy, PolicyError};
use iac_runner::{
    CollectionRunner, OutputTarget, PolicyResourceResult, Reporter, RunConfig, RunnerError,
};
use tempfile::TempDir;

const SSE: &str = "aws_s3_bucket_server_side_encryption_configuration";

/// Helper: a reporter that records every callback.
#[derive(Default)]
struct RecordingReporter {
    started: Vec<String>,
    batches: Vec<Vec<(String, String)>>,
    errors: Vec<String>,
    ended: bool,
}

impl RecordingReporter {
    fn findings(&self) -> Vec<(String, String)> {
        self.batches.iter().flatten().cloned().collect()
    }
}

impl Reporter for RecordingReporter {
    fn on_execution_started(&mut self, policies: &[Policy]) {
        self.started = policies.iter().map(|p| p.name().to_string()).collect();
    }

    fn on_results(&mut self, results: &[PolicyResourceResult]) {
        self.batches.push(
            results
                .iter()
                .map(|r| (r.policy.name.clone(), r.resource.id.clone()))
                .collect(),
        );
    }

    fn on_policy_error(&mut self, error: &PolicyError) {
        self.errors.push(error.to_string());
    }

    fn on_execution_ended(&mut self) -> Result<(), RunnerError> {
        self.ended = true;
        Ok(())
    }

    fn render(&self) -> Result<String, RunnerError> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Helper: source and policy directories with the given contents.
fn workspace(sources: &[(&str, &str)], policies: &[(&str, &str)]) -> (TempDir, RunConfig) {
    let root = TempDir::new().unwrap();
    let src = root.path().join("src");
    let pol = root.path().join("policies");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&pol).unwrap();
    write_all(&src, sources);
    write_all(&pol, policies);
    let config = RunConfig::for_dirs(&src, &pol);
    (root, config)
}

fn write_all(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

fn bucket_with_sse() -> String {
    format!(
        r#"{{"resource": {{
            "aws_s3_bucket": {{"b1": {{"bucket": "logs"}}}},
            "{SSE}": {{"sse1": {{"bucket": "${{aws_s3_bucket.b1.id}}"}}}}
        }}}}"#
    )
}

const BUCKET_ONLY: &str = r#"{"resource": {"aws_s3_bucket": {"b1": {"bucket": "logs"}}}}"#;

fn encryption_policy() -> String {
    format!(
        "policies:\n  - name: s3-encrypted\n    resource: terraform.aws_s3_bucket\n    filters:\n      - type: related_resource\n        resource_type: {SSE}\n"
    )
}

#[test]
fn related_resource_scenario() {
    let sources = bucket_with_sse();
    let policy = encryption_policy();
    let (_root, config) = workspace(&[("main.tf.json", &sources)], &[("s3.yml", &policy)]);

    let mut reporter = RecordingReporter::default();
    let summary = CollectionRunner::new(config).run(&mut reporter).unwrap();

    assert!(summary.found);
    assert_eq!(summary.result_count, 1);
    assert_eq!(summary.resource_count, 2);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(reporter.started, ["s3-encrypted"]);
    assert_eq!(
        reporter.findings(),
        [("s3-encrypted".to_string(), "aws_s3_bucket.b1".to_string())]
    );
    assert!(reporter.ended);
}

#[test]
fn removing_the_related_resource_removes_the_finding() {
    let policy = encryption_policy();
    let (_root, config) = workspace(&[("main.tf.json", BUCKET_ONLY)], &[("s3.yml", &policy)]);

    let mut reporter = RecordingReporter::default();
    let summary = CollectionRunner::new(config).run(&mut reporter).unwrap();

    assert!(!summary.found);
    assert_eq!(summary.exit_code(), 0);
    assert!(reporter.batches.is_empty());
    assert!(reporter.ended);
}

#[test]
fn evaluation_is_idempotent() {
    let sources = bucket_with_sse();
    let policy = encryption_policy();
    let link = "policies:\n  - name: linked\n    resource: terraform.aws_s3_bucket\n    filters:\n      - type: link\n        resources: aws_s3_bucket_server_side_encryption_configuration\n";
    let (_root, config) = workspace(
        &[("main.tf.json", &sources)],
        &[("s3.yml", &policy), ("link.yml", link)],
    );

    let runner = CollectionRunner::new(config);
    let graph = runner.load_graph().unwrap();
    let mut reporter = RecordingReporter::default();
    let (policies, errors) = runner.load_policies(&mut reporter).unwrap();
    assert_eq!(errors, 0);

    let membership = |results: &[PolicyResourceResult]| -> Vec<(String, String)> {
        results
            .iter()
            .map(|r| (r.policy.name.clone(), r.resource.id.clone()))
            .collect()
    };
    let first = runner.evaluate(&graph, &policies, &mut reporter);
    let second = runner.evaluate(&graph, &policies, &mut reporter);
    assert_eq!(first.len(), 2);
    assert_eq!(membership(&first), membership(&second));

    // Annotations are per run, never accumulated.
    let linked = second.iter().find(|r| r.policy.name == "linked").unwrap();
    assert_eq!(linked.resource.annotations.len(), 1);
    assert_eq!(linked.resource.annotations[&format!("c7n:{SSE}")].len(), 1);
}

#[test]
fn wildcard_policies_cover_related_types() {
    let sources = bucket_with_sse();
    let policy = "policies:\n  - name: all-s3\n    resource: terraform.aws_s3_bucket*\n";
    let (_root, config) = workspace(&[("main.tf.json", &sources)], &[("all.yml", policy)]);

    let mut reporter = RecordingReporter::default();
    let summary = CollectionRunner::new(config).run(&mut reporter).unwrap();

    assert_eq!(summary.result_count, 2);
    let ids: Vec<_> = reporter.findings().into_iter().map(|(_, id)| id).collect();
    assert_eq!(ids, ["aws_s3_bucket.b1", format!("{SSE}.sse1").as_str()]);
}

#[test]
fn invalid_policies_are_reported_and_siblings_still_run() {
    let sources = bucket_with_sse();
    let policies = format!(
        "{}  - name: bad-filter\n    resource: terraform.aws_s3_bucket\n    filters:\n      - type: nonsense\n  - name: bad-var\n    resource: terraform.aws_s3_bucket\n    filters:\n      - bucket: \"{{undefined}}\"\n",
        encryption_policy()
    );
    let (_root, config) = workspace(&[("main.tf.json", &sources)], &[("s3.yml", &policies)]);

    let mut reporter = RecordingReporter::default();
    let summary = CollectionRunner::new(config).run(&mut reporter).unwrap();

    assert_eq!(summary.policy_errors, 2);
    assert_eq!(summary.policy_count, 1);
    assert_eq!(summary.result_count, 1);
    assert_eq!(reporter.errors.len(), 2);
    assert!(reporter.errors[0].contains("bad-filter"));
    assert!(reporter.errors[1].contains("bad-var"));
}

#[test]
fn user_variables_expand_into_filters() {
    let sources = r#"{"resource": {"aws_s3_bucket": {
        "logs": {"bucket": "logs", "tags": {"env": "prod"}},
        "scratch": {"bucket": "scratch", "tags": {"env": "dev"}}
    }}}"#;
    let policy = "policies:\n  - name: env-buckets\n    resource: terraform.aws_s3_bucket\n    filters:\n      - tags.env: \"{env}\"\n";
    let (_root, mut config) = workspace(&[("main.tf.json", sources)], &[("env.yml", policy)]);
    config.variables.insert("env".to_string(), "dev".to_string());

    let mut reporter = RecordingReporter::default();
    CollectionRunner::new(config).run(&mut reporter).unwrap();
    let ids: Vec<_> = reporter.findings().into_iter().map(|(_, id)| id).collect();
    assert_eq!(ids, ["aws_s3_bucket.scratch"]);
}

#[test]
fn no_sources_is_fatal() {
    let policy = encryption_policy();
    let (_root, config) = workspace(&[("README.md", "# infra")], &[("s3.yml", &policy)]);

    let mut reporter = RecordingReporter::default();
    match CollectionRunner::new(config).run(&mut reporter) {
        Err(RunnerError::SourceNotFound { provider, .. }) => assert_eq!(provider, "terraform"),
        other => panic!("expected SourceNotFound, got {:?}", other),
    }
    assert!(!reporter.ended);
}

#[test]
fn no_policies_is_fatal() {
    let (_root, config) = workspace(&[("main.tf.json", BUCKET_ONLY)], &[]);

    let mut reporter = RecordingReporter::default();
    match CollectionRunner::new(config).run(&mut reporter) {
        Err(RunnerError::NoPolicies { .. }) => {}
        other => panic!("expected NoPolicies, got {:?}", other),
    }
}

#[test]
fn unknown_provider_is_fatal() {
    let policy = encryption_policy();
    let (_root, mut config) = workspace(&[("main.tf.json", BUCKET_ONLY)], &[("s3.yml", &policy)]);
    config.provider = "pulumi".to_string();

    let mut reporter = RecordingReporter::default();
    assert!(matches!(
        CollectionRunner::new(config).run(&mut reporter),
        Err(RunnerError::UnknownProvider { .. })
    ));
}

#[test]
fn json_report_is_written_to_file() {
    let sources = bucket_with_sse();
    let policy = encryption_policy();
    let (root, config) = workspace(&[("main.tf.json", &sources)], &[("s3.yml", &policy)]);
    let report = root.path().join("report.json");

    let mut reporter = iac_runner::get_reporter(
        iac_runner::OutputFormat::Json,
        OutputTarget::File(report.clone()),
    );
    CollectionRunner::new(config).run(reporter.as_mut()).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(parsed["result_count"], 1);
    assert_eq!(parsed["results"][0]["policy"], "s3-encrypted");
    assert_eq!(parsed["results"][0]["file"], "main.tf.json");
}

#[test]
fn json_report_carries_link_annotations() {
    let sources = r#"{"resource": {
        "aws_s3_bucket": {"b1": {"bucket": "logs"}},
        "aws_s3_bucket_versioning": {"v1": {"bucket": "${aws_s3_bucket.b1.id}", "status": "Enabled"}}
    }}"#;
    let policy = "policies:\n  - name: versioned\n    resource: terraform.aws_s3_bucket\n    filters:\n      - type: link\n        resources: aws_s3_bucket_versioning\n        count: 1\n";
    let (root, config) = workspace(&[("main.tf.json", sources)], &[("versioning.yml", policy)]);
    let report = root.path().join("report.json");

    let mut reporter = iac_runner::get_reporter(
        iac_runner::OutputFormat::Json,
        OutputTarget::File(report.clone()),
    );
    let summary = CollectionRunner::new(config).run(reporter.as_mut()).unwrap();
    assert_eq!(summary.result_count, 1);

    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    let resource = &parsed["results"][0]["resource"];
    assert_eq!(resource["id"], "aws_s3_bucket.b1");
    let linked = resource["c7n:aws_s3_bucket_versioning"]
        .as_array()
        .unwrap_or_else(|| panic!("no link annotation in {}", resource));
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0]["id"], "aws_s3_bucket_versioning.v1");
    assert_eq!(linked[0]["status"], "Enabled");
}

#[test]
fn hcl_only_sources_are_fatal() {
    let policy = encryption_policy();
    let (_root, config) = workspace(
        &[("main.tf", "resource \"aws_s3_bucket\" \"b1\" {}\n")],
        &[("s3.yml", &policy)],
    );

    let mut reporter = RecordingReporter::default();
    match CollectionRunner::new(config).run(&mut reporter) {
        Err(RunnerError::UnsupportedSources { provider, skipped, .. }) => {
            assert_eq!(provider, "terraform");
            assert_eq!(skipped, 1);
        }
        other => panic!("expected UnsupportedSources, got {:?}", other),
    }
    assert!(reporter.findings().is_empty());
    assert!(!reporter.ended);
}

#[test]
fn hcl_next_to_json_is_skipped() {
    let policy = encryption_policy();
    let (_root, config) = workspace(
        &[
            ("main.tf.json", BUCKET_ONLY),
            ("legacy.tf", "resource \"aws_s3_bucket\" \"old\" {}\n"),
        ],
        &[("s3.yml", &policy)],
    );

    let mut reporter = RecordingReporter::default();
    let summary = CollectionRunner::new(config).run(&mut reporter).unwrap();
    assert_eq!(summary.resource_count, 1);
}
