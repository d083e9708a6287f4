// store.rs - PolicyStore: loads policy files from a directory tree.
//
// Every `*.yml` / `*.yaml` file under the directory is read, recursively,
// in sorted path order. Hidden files and directories are skipped. Each file
// holds a top-level `policies:` list.
//
//   policies:
//     - name: s3-encryption
//       resource: terraform.aws_s3_bucket
//       filters:
//         - type: related_resource
//           resource_type: aws_s3_bucket_server_side_encryption_configuration
//           value: absent

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PolicyError;
use crate::policy::PolicyDefinition;

#[derive(Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policies: Vec<PolicyDefinition>,
}

/// Loads policy definitions from disk.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    policy_dir: PathBuf,
}

impl PolicyStore {
    pub fn new(policy_dir: impl AsRef<Path>) -> Self {
        Self {
            policy_dir: policy_dir.as_ref().to_path_buf(),
        }
    }

    /// Shorthand for `PolicyStore::new(dir).load()`.
    pub fn load_dir(policy_dir: impl AsRef<Path>) -> Result<Vec<PolicyDefinition>, PolicyError> {
        Self::new(policy_dir).load()
    }

    pub fn policy_dir(&self) -> &Path {
        &self.policy_dir
    }

    /// Load every policy. Policy names must be unique across all files.
    ///
    /// An unreadable file or a file that is not a policy document is an
    /// error; a policy that is well-formed YAML but semantically invalid is
    /// returned as-is and rejected later, by validation.
    pub fn load(&self) -> Result<Vec<PolicyDefinition>, PolicyError> {
        let mut files = Vec::new();
        collect_policy_files(&self.policy_dir, &mut files)?;
        files.sort();

        let mut seen = BTreeSet::new();
        let mut policies = Vec::new();
        for path in files {
            for mut policy in read_policy_file(&path)? {
                if !policy.name.is_empty() && !seen.insert(policy.name.clone()) {
                    return Err(PolicyError::DuplicatePolicy { name: policy.name });
                }
                policy.source_file = Some(path.clone());
                policies.push(policy);
            }
        }

        tracing::debug!(
            "loaded {} policies from {}",
            policies.len(),
            self.policy_dir.display()
        );
        Ok(policies)
    }
}

fn collect_policy_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PolicyError> {
    let io_err = |source| PolicyError::Io {
        path: dir.display().to_string(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_policy_files(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            files.push(path);
        }
    }
    Ok(())
}

fn read_policy_file(path: &Path) -> Result<Vec<PolicyDefinition>, PolicyError> {
    let text = fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: PolicyFile = serde_yaml::from_str(&text).map_err(|source| PolicyError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    Ok(file.policies)
}
