// list_policies.rs - `iac list-policies`: validate and list a policy directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use iac_policy::{FilterRegistry, Policy, PolicyStore, Variables};

use crate::commands::run::parse_var;

#[derive(Args, Debug)]
pub struct ListPoliciesArgs {
    /// Directory holding policy YAML files.
    #[arg(short = 'p', long)]
    pub policy_dir: PathBuf,

    /// Policy variable as KEY=VALUE; may be repeated.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

/// One line per policy: name, resource patterns, and status.
pub fn describe(policy_dir: &Path, vars: &[(String, String)]) -> anyhow::Result<(Vec<String>, usize)> {
    let definitions = PolicyStore::load_dir(policy_dir)
        .with_context(|| format!("failed to load policies from {}", policy_dir.display()))?;

    let registry = FilterRegistry::with_defaults();
    let mut variables = Variables::for_run(Path::new("."), policy_dir);
    variables.extend(vars.iter().cloned());

    let mut lines = Vec::new();
    let mut invalid = 0;
    for definition in definitions {
        let name = definition.name.clone();
        let resources = definition
            .resource
            .as_ref()
            .map(|r| r.iter().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        match Policy::compile(definition, &registry, &variables) {
            Ok(policy) => lines.push(format!(
                "{:<32} {:<40} ok ({} filters)",
                name,
                resources,
                policy.filters().len()
            )),
            Err(e) => {
                invalid += 1;
                lines.push(format!("{:<32} {:<40} INVALID: {}", name, resources, e));
            }
        }
    }
    Ok((lines, invalid))
}

pub fn execute(args: &ListPoliciesArgs) -> anyhow::Result<()> {
    let (lines, invalid) = describe(&args.policy_dir, &args.vars)?;
    if lines.is_empty() {
        println!("No policies found in {}", args.policy_dir.display());
        return Ok(());
    }
    for line in &lines {
        println!("{}", line);
    }
    println!();
    println!("{} policies, {} invalid", lines.len(), invalid);
    if invalid > 0 {
        anyhow::bail!("{} invalid policies", invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn describe_marks_invalid_policies() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("p.yml"),
            "policies:\n  - name: good\n    resource: terraform.aws_s3_bucket\n    filters:\n      - acl: private\n  - name: bad\n    resource: terraform.aws_s3_bucket\n    filters:\n      - type: bogus\n",
        )
        .unwrap();

        let (lines, invalid) = describe(dir.path(), &[]).unwrap();
        assert_eq!(invalid, 1);
        assert!(lines[0].starts_with("good"));
        assert!(lines[0].ends_with("ok (1 filters)"));
        assert!(lines[1].contains("INVALID"));
        assert!(lines[1].contains("unknown filter type 'bogus'"));
    }
}
