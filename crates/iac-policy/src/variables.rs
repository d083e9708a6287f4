// variables.rs - `{name}` placeholder expansion in policy data.
//
// Placeholders are `{identifier}`; anything else in braces (regex counts
// like `{3}`, JSON snippets) is left alone. A placeholder that names an
// undefined variable is an error, scoped to the policy that carries it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::PolicyError;

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Values available to `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in variables for one run: `source_dir`, `policy_dir`, and `now`.
    pub fn for_run(source_dir: &Path, policy_dir: &Path) -> Self {
        let mut vars = Self::new();
        vars.insert("source_dir", source_dir.display().to_string());
        vars.insert("policy_dir", policy_dir.display().to_string());
        vars.insert("now", Utc::now().to_rfc3339());
        vars
    }

    /// Define or overwrite a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Merge user-supplied variables on top of these (user values win).
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in entries {
            self.insert(k, v);
        }
    }

    /// Expand placeholders in every string inside `value`, in place.
    pub fn expand_value(&self, value: &mut Value) -> Result<(), PolicyError> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
        self.expand_with(&pattern, value)
    }

    /// Expand placeholders in a single string.
    pub fn expand_str(&self, text: &str) -> Result<String, PolicyError> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
        self.expand_text(&pattern, text)
    }

    fn expand_with(&self, pattern: &Regex, value: &mut Value) -> Result<(), PolicyError> {
        match value {
            Value::String(text) => {
                if pattern.is_match(text) {
                    *text = self.expand_text(pattern, text)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.expand_with(pattern, item)?;
                }
            }
            Value::Object(map) => {
                for item in map.values_mut() {
                    self.expand_with(pattern, item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn expand_text(&self, pattern: &Regex, text: &str) -> Result<String, PolicyError> {
        if let Some(missing) = pattern
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .find(|name| !self.values.contains_key(name))
        {
            return Err(PolicyError::UnknownVariable { name: missing });
        }
        Ok(pattern
            .replace_all(text, |caps: &Captures| self.values[&caps[1]].clone())
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Variables {
        let mut vars = Variables::new();
        vars.insert("env", "prod");
        vars.insert("team", "infra");
        vars
    }

    #[test]
    fn expands_nested_strings() {
        let mut data = json!({
            "key": "tags.env",
            "value": "{env}",
            "attrs": [{"tags.owner": "{team}-{env}"}]
        });
        vars().expand_value(&mut data).unwrap();
        assert_eq!(data["value"], json!("prod"));
        assert_eq!(data["attrs"][0]["tags.owner"], json!("infra-prod"));
    }

    #[test]
    fn leaves_non_identifier_braces_alone() {
        let text = vars().expand_str("^[a-z]{3}$").unwrap();
        assert_eq!(text, "^[a-z]{3}$");
        let text = vars().expand_str(r#"{"Version": "2012"}"#).unwrap();
        assert_eq!(text, r#"{"Version": "2012"}"#);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        match vars().expand_str("{region}") {
            Err(PolicyError::UnknownVariable { name }) => assert_eq!(name, "region"),
            other => panic!("expected UnknownVariable, got {:?}", other),
        }
    }

    #[test]
    fn run_builtins_are_defined() {
        let vars = Variables::for_run(Path::new("/src"), Path::new("/policies"));
        assert_eq!(vars.get("source_dir"), Some("/src"));
        assert_eq!(vars.get("policy_dir"), Some("/policies"));
        assert!(vars.get("now").is_some());
    }

    #[test]
    fn user_values_override_builtins() {
        let mut vars = Variables::for_run(Path::new("/src"), Path::new("/p"));
        vars.extend([("source_dir", "/override")]);
        assert_eq!(vars.get("source_dir"), Some("/override"));
    }
}
