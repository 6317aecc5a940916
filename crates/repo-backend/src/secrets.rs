//! Turning opaque secret references into values.
//!
//! Backend specs only ever carry reference strings. A [`SecretStore`] is the
//! collaborator that knows how to look them up.

use std::collections::{BTreeMap, HashMap};

use crate::env::EnvMap;
use crate::error::{Error, Result};

pub trait SecretStore {
    fn lookup(&self, reference: &str) -> Option<String>;
}

impl SecretStore for BTreeMap<String, String> {
    fn lookup(&self, reference: &str) -> Option<String> {
        self.get(reference).cloned()
    }
}

impl SecretStore for HashMap<String, String> {
    fn lookup(&self, reference: &str) -> Option<String> {
        self.get(reference).cloned()
    }
}

/// Resolves references against the process environment, so a reference
/// `S3_ACCESS_KEY` reads `$S3_ACCESS_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn lookup(&self, reference: &str) -> Option<String> {
        std::env::var(reference).ok()
    }
}

pub fn resolve_secret(store: &dyn SecretStore, env_key: &str, reference: &str) -> Result<String> {
    store
        .lookup(reference)
        .ok_or_else(|| Error::secret_not_found(env_key, reference))
}

/// Resolves every value of `vars`, failing on the first missing reference.
pub fn resolve_env(store: &dyn SecretStore, vars: &EnvMap) -> Result<EnvMap> {
    vars.iter()
        .map(|(key, reference)| resolve_secret(store, key, reference).map(|v| (key.clone(), v)))
        .collect()
}
