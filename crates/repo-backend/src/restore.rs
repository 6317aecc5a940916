use std::collections::BTreeMap;

use crate::backend::S3Spec;
use crate::backend::variants::or_global;
use crate::env::{self, EnvVar};
use crate::globals::GlobalConfig;

impl S3Spec {
    /// Environment for restore jobs. Always yields the access key, secret key
    /// and `<endpoint>/<bucket>` entries, each falling back to the global
    /// restore defaults independently.
    pub fn restore_env_vars(&self, globals: &GlobalConfig) -> BTreeMap<String, EnvVar> {
        let access_key = or_global(
            &self.access_key_id_secret_ref,
            &globals.restore_s3_access_key_id,
            "restore.s3.accessKeyID",
        );
        let secret_key = or_global(
            &self.secret_access_key_secret_ref,
            &globals.restore_s3_secret_access_key,
            "restore.s3.secretAccessKey",
        );
        let endpoint = or_global(
            &self.endpoint,
            &globals.restore_s3_endpoint,
            "restore.s3.endpoint",
        );
        let bucket = or_global(&self.bucket, &globals.restore_s3_bucket, "restore.s3.bucket");

        [
            EnvVar::new(env::RESTORE_S3_ACCESS_KEY_ID, access_key),
            EnvVar::new(env::RESTORE_S3_SECRET_ACCESS_KEY, secret_key),
            EnvVar::new(env::RESTORE_S3_ENDPOINT, format!("{endpoint}/{bucket}")),
        ]
        .into_iter()
        .map(|v| (v.name.clone(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AzureSpec, BackendSpec};

    fn restore_globals() -> GlobalConfig {
        GlobalConfig {
            s3_endpoint: "http://backup:9000".into(),
            s3_bucket: "backup-bucket".into(),
            restore_s3_access_key_id: "global-id".into(),
            restore_s3_secret_access_key: "global-secret".into(),
            restore_s3_bucket: "restore-bucket".into(),
            restore_s3_endpoint: "http://restore:9000".into(),
        }
    }

    fn value<'a>(vars: &'a BTreeMap<String, EnvVar>, key: &str) -> &'a str {
        vars.get(key).map(|v| v.value.as_str()).unwrap_or("<missing>")
    }

    #[test]
    fn empty_spec_uses_restore_defaults_not_backup_defaults() {
        let vars = S3Spec::default().restore_env_vars(&restore_globals());
        assert_eq!(vars.len(), 3);
        assert_eq!(value(&vars, env::RESTORE_S3_ACCESS_KEY_ID), "global-id");
        assert_eq!(value(&vars, env::RESTORE_S3_SECRET_ACCESS_KEY), "global-secret");
        assert_eq!(
            value(&vars, env::RESTORE_S3_ENDPOINT),
            "http://restore:9000/restore-bucket"
        );
    }

    #[test]
    fn each_field_falls_back_independently() {
        let spec = S3Spec {
            bucket: "mine".into(),
            secret_access_key_secret_ref: "own-secret".into(),
            ..Default::default()
        };
        let vars = spec.restore_env_vars(&restore_globals());
        assert_eq!(value(&vars, env::RESTORE_S3_ACCESS_KEY_ID), "global-id");
        assert_eq!(value(&vars, env::RESTORE_S3_SECRET_ACCESS_KEY), "own-secret");
        assert_eq!(value(&vars, env::RESTORE_S3_ENDPOINT), "http://restore:9000/mine");
    }

    #[test]
    fn three_entries_even_with_nothing_configured() {
        let vars = S3Spec::default().restore_env_vars(&GlobalConfig::default());
        assert_eq!(vars.len(), 3);
        assert_eq!(value(&vars, env::RESTORE_S3_ACCESS_KEY_ID), "");
        assert_eq!(value(&vars, env::RESTORE_S3_ENDPOINT), "/");
        for (key, var) in &vars {
            assert_eq!(key, &var.name);
        }
    }

    #[test]
    fn aggregate_ignores_active_backend() {
        let spec = BackendSpec {
            azure: Some(AzureSpec {
                container: "c".into(),
                ..Default::default()
            }),
            s3: Some(S3Spec {
                endpoint: "http://s3".into(),
                bucket: "b".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let vars = spec.restore_env_vars(&restore_globals());
        assert_eq!(value(&vars, env::RESTORE_S3_ENDPOINT), "http://s3/b");

        let no_s3 = BackendSpec {
            azure: spec.azure.clone(),
            ..Default::default()
        };
        let vars = no_s3.restore_env_vars(&restore_globals());
        assert_eq!(vars.len(), 3);
        assert_eq!(
            value(&vars, env::RESTORE_S3_ENDPOINT),
            "http://restore:9000/restore-bucket"
        );
    }
}
