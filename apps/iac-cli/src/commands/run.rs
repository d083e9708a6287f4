// run.rs - `iac run`: evaluate policies against a source directory.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use iac_runner::{reporter_for, CollectionRunner, OutputFormat, RunConfig, RunSummary};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory holding the IaC sources.
    #[arg(short = 'd', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Directory holding policy YAML files.
    #[arg(short = 'p', long)]
    pub policy_dir: Option<PathBuf>,

    /// Report format: terminal or json.
    #[arg(short = 'o', long)]
    pub output: Option<OutputFormat>,

    /// Write the report to a file instead of stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Dotted path projected out of each JSON result (e.g. `resource.bucket`).
    #[arg(long)]
    pub output_query: Option<String>,

    /// Source provider (default: terraform).
    #[arg(long)]
    pub provider: Option<String>,

    /// Policy variable as KEY=VALUE; may be repeated.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// TOML run configuration; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Parse a `KEY=VALUE` pair.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid variable '{}': expected KEY=VALUE", s)),
    }
}

/// Merge the config file (if any) with command-line flags.
pub fn build_config(args: &RunArgs) -> anyhow::Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(dir) = &args.directory {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &args.policy_dir {
        config.policy_dir = dir.clone();
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    if let Some(file) = &args.output_file {
        config.output_file = Some(file.clone());
    }
    if let Some(query) = &args.output_query {
        config.output_query = Some(query.clone());
    }
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    config.variables.extend(args.vars.iter().cloned());

    if config.source_dir.as_os_str().is_empty() {
        anyhow::bail!("no source directory: pass --directory or set source_dir in --config");
    }
    if config.policy_dir.as_os_str().is_empty() {
        anyhow::bail!("no policy directory: pass --policy-dir or set policy_dir in --config");
    }
    Ok(config)
}

pub fn execute(args: &RunArgs) -> anyhow::Result<RunSummary> {
    let config = build_config(args)?;
    let mut reporter = reporter_for(&config);

    let summary = CollectionRunner::new(config)
        .run(reporter.as_mut())
        .context("policy evaluation failed")?;

    tracing::info!(
        "{} finding(s) across {} resources; {} policies evaluated, {} skipped",
        summary.result_count,
        summary.resource_count,
        summary.policy_count,
        summary.policy_errors
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(parse_var("env=prod").unwrap(), ("env".into(), "prod".into()));
        assert_eq!(parse_var("q=a=b").unwrap(), ("q".into(), "a=b".into()));
        assert_eq!(parse_var("empty=").unwrap(), ("empty".into(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iac.toml");
        fs::write(
            &path,
            "source_dir = \"infra\"\npolicy_dir = \"policies\"\noutput = \"json\"\n[variables]\nenv = \"dev\"\n",
        )
        .unwrap();
        let args = RunArgs {
            directory: Some(PathBuf::from("/elsewhere")),
            output: Some(OutputFormat::Terminal),
            vars: vec![("env".into(), "prod".into())],
            config: Some(path),
            ..RunArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.source_dir, PathBuf::from("/elsewhere"));
        assert_eq!(config.policy_dir, dir.path().join("policies"));
        assert_eq!(config.output, OutputFormat::Terminal);
        assert_eq!(config.variables["env"], "prod");
    }

    #[test]
    fn directories_are_required() {
        let args = RunArgs {
            policy_dir: Some(PathBuf::from("policies")),
            ..RunArgs::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn execute_reports_findings() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let policies = dir.path().join("policies");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&policies).unwrap();
        fs::write(
            src.join("main.tf.json"),
            r#"{"resource": {"aws_s3_bucket": {"b1": {"acl": "public-read"}}}}"#,
        )
        .unwrap();
        fs::write(
            policies.join("acl.yml"),
            "policies:\n  - name: public-acl\n    resource: terraform.aws_s3_bucket\n    filters:\n      - acl: public-read\n",
        )
        .unwrap();

        let args = RunArgs {
            directory: Some(src),
            policy_dir: Some(policies),
            output: Some(OutputFormat::Json),
            output_file: Some(dir.path().join("report.json")),
            ..RunArgs::default()
        };
        let summary = execute(&args).unwrap();
        assert_eq!(summary.exit_code(), 1);
        assert!(dir.path().join("report.json").exists());

        let queried = RunArgs {
            output_query: Some("resource.acl".to_string()),
            output_file: Some(dir.path().join("acl.json")),
            ..args
        };
        execute(&queried).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("acl.json")).unwrap()).unwrap();
        assert_eq!(report["results"], serde_json::json!(["public-read"]));
    }

    #[test]
    fn hcl_only_sources_fail() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let policies = dir.path().join("policies");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&policies).unwrap();
        fs::write(src.join("main.tf"), "resource \"aws_s3_bucket\" \"b1\" {}\n").unwrap();
        fs::write(
            policies.join("acl.yml"),
            "policies:\n  - name: public-acl\n    resource: terraform.aws_s3_bucket\n    filters:\n      - acl: public-read\n",
        )
        .unwrap();

        let args = RunArgs {
            directory: Some(src),
            policy_dir: Some(policies),
            ..RunArgs::default()
        };
        let err = execute(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("none in a format that is parsed"));
    }
}
