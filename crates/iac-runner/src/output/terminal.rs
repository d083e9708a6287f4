//! terminal.rs - Human-readable report, one block per finding.
//!
//! ```text
//! [s3-encryption] aws_s3_bucket.b1
//!   Reason: buckets must have server-side encryption
//!   File: main.tf.json
//!
//! 1 finding(s) from 3 policies, 0 policy error(s)
//! ```

use iac_policy::{Policy, PolicyError};

use crate::error::RunnerError;
use crate::output::{split_policy_error, OutputTarget, Reporter};
use crate::runner::PolicyResourceResult;

pub struct TerminalReporter {
    target: OutputTarget,
    policy_count: usize,
    findings: Vec<String>,
    errors: Vec<String>,
}

impl TerminalReporter {
    pub fn new(target: OutputTarget) -> Self {
        Self {
            target,
            policy_count: 0,
            findings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn render_finding(result: &PolicyResourceResult) -> String {
        let resource = &result.resource;
        let mut block = format!("[{}] {}\n", result.policy.name, resource.id);
        if let Some(description) = &result.policy.description {
            block.push_str(&format!("  Reason: {}\n", description.trim()));
        }
        if !resource.meta.filename.is_empty() {
            block.push_str(&format!("  File: {}\n", resource.meta.filename));
        }
        if resource.meta.path != resource.id {
            block.push_str(&format!("  Path: {}\n", resource.meta.path));
        }
        block
    }
}

impl Reporter for TerminalReporter {
    fn on_execution_started(&mut self, policies: &[Policy]) {
        self.policy_count = policies.len();
    }

    fn on_results(&mut self, results: &[PolicyResourceResult]) {
        self.findings
            .extend(results.iter().map(Self::render_finding));
    }

    fn on_policy_error(&mut self, error: &PolicyError) {
        let (policy, reason) = split_policy_error(error);
        self.errors.push(format!("policy '{}' skipped: {}", policy, reason));
    }

    fn on_execution_ended(&mut self) -> Result<(), RunnerError> {
        let text = self.render()?;
        self.target.write(&text)
    }

    fn render(&self) -> Result<String, RunnerError> {
        let mut out = String::new();
        for error in &self.errors {
            out.push_str(error);
            out.push('\n');
        }
        if !self.errors.is_empty() {
            out.push('\n');
        }
        for finding in &self.findings {
            out.push_str(finding);
            out.push('\n');
        }
        out.push_str(&format!(
            "{} finding(s) from {} policies, {} policy error(s)\n",
            self.findings.len(),
            self.policy_count,
            self.errors.len()
        ));
        Ok(out)
    }

    fn name(&self) -> &str {
        "terminal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::finding;

    #[test]
    fn renders_findings_and_summary() {
        let mut reporter = TerminalReporter::new(OutputTarget::Stdout);
        reporter.on_results(&[finding("s3-encryption", "aws_s3_bucket.b1", Some("needs SSE"))]);
        reporter.on_policy_error(&PolicyError::MissingField {
            field: "resource".to_string(),
        }
        .for_policy("broken"));

        let text = reporter.render().unwrap();
        assert!(text.contains("[s3-encryption] aws_s3_bucket.b1\n  Reason: needs SSE\n  File: main.tf.json\n"));
        assert!(text.contains("policy 'broken' skipped: missing required field 'resource'"));
        assert!(text.ends_with("1 finding(s) from 0 policies, 1 policy error(s)\n"));
    }

    #[test]
    fn empty_run_has_only_a_summary() {
        let reporter = TerminalReporter::new(OutputTarget::Stdout);
        assert_eq!(
            reporter.render().unwrap(),
            "0 finding(s) from 0 policies, 0 policy error(s)\n"
        );
    }
}
