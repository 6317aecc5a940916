//! Environment variable names and carriers handed to backup and restore jobs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Credential environment: env var name to opaque secret reference.
pub type EnvMap = BTreeMap<String, String>;

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const GOOGLE_PROJECT_ID: &str = "GOOGLE_PROJECT_ID";
pub const GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const AZURE_ACCOUNT_NAME: &str = "AZURE_ACCOUNT_NAME";
pub const AZURE_ACCOUNT_KEY: &str = "AZURE_ACCOUNT_KEY";
pub const B2_ACCOUNT_ID: &str = "B2_ACCOUNT_ID";
pub const B2_ACCOUNT_KEY: &str = "B2_ACCOUNT_KEY";
pub const REST_USER: &str = "USER";
pub const REST_PASSWORD: &str = "PASSWORD";

pub const RESTORE_S3_ACCESS_KEY_ID: &str = "RESTORE_ACCESSKEYID";
pub const RESTORE_S3_SECRET_ACCESS_KEY: &str = "RESTORE_SECRETACCESSKEY";
pub const RESTORE_S3_ENDPOINT: &str = "RESTORE_S3ENDPOINT";

pub const RESTIC_REPOSITORY: &str = "RESTIC_REPOSITORY";
pub const RESTIC_PASSWORD: &str = "RESTIC_PASSWORD";
pub const RESTIC_OPTIONS: &str = "RESTIC_OPTIONS";

/// Inserts `key` only when `value` is non-empty; an empty value leaves any
/// existing entry untouched.
pub fn insert_if_set(vars: &mut EnvMap, key: &str, value: &str) {
    if !value.is_empty() {
        vars.insert(key.to_string(), value.to_string());
    }
}

/// Adds a credential whose value is an opaque secret reference.
pub fn add_env_var_from_secret(vars: &mut EnvMap, key: &str, reference: &str) {
    insert_if_set(vars, key, reference);
}

/// A single entry of a job container's environment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Flattens a keyed env map into the list shape a job spec expects.
pub fn to_env_list(vars: &BTreeMap<String, EnvVar>) -> Vec<EnvVar> {
    vars.values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reference_does_not_clobber_existing_entry() {
        let mut vars = EnvMap::new();
        vars.insert(AWS_ACCESS_KEY_ID.into(), "earlier".into());
        add_env_var_from_secret(&mut vars, AWS_ACCESS_KEY_ID, "");
        assert_eq!(vars.get(AWS_ACCESS_KEY_ID).map(String::as_str), Some("earlier"));

        add_env_var_from_secret(&mut vars, AWS_ACCESS_KEY_ID, "s3-creds/id");
        assert_eq!(
            vars.get(AWS_ACCESS_KEY_ID).map(String::as_str),
            Some("s3-creds/id")
        );
    }

    #[test]
    fn env_list_keeps_key_order() {
        let mut vars = BTreeMap::new();
        vars.insert("B".to_string(), EnvVar::new("B", "2"));
        vars.insert("A".to_string(), EnvVar::new("A", "1"));
        let list = to_env_list(&vars);
        assert_eq!(list, vec![EnvVar::new("A", "1"), EnvVar::new("B", "2")]);
    }
}
