//! Operator-wide fallback defaults consulted by the S3 backend.
//!
//! Resolution never reads these from process state on its own; callers build a
//! [`GlobalConfig`] once at startup and pass it by reference.

use serde::{Deserialize, Serialize};

pub const GLOBAL_S3_ENDPOINT_ENV: &str = "BACKUP_GLOBALS3ENDPOINT";
pub const GLOBAL_S3_BUCKET_ENV: &str = "BACKUP_GLOBALS3BUCKET";
pub const GLOBAL_RESTORE_S3_ACCESS_KEY_ID_ENV: &str = "BACKUP_GLOBALRESTORES3ACCESSKEYID";
pub const GLOBAL_RESTORE_S3_SECRET_ACCESS_KEY_ENV: &str = "BACKUP_GLOBALRESTORES3SECRETACCESSKEY";
pub const GLOBAL_RESTORE_S3_BUCKET_ENV: &str = "BACKUP_GLOBALRESTORES3BUCKET";
pub const GLOBAL_RESTORE_S3_ENDPOINT_ENV: &str = "BACKUP_GLOBALRESTORES3ENDPOINT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub restore_s3_access_key_id: String,
    pub restore_s3_secret_access_key: String,
    pub restore_s3_bucket: String,
    pub restore_s3_endpoint: String,
}

impl GlobalConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay_env(lookup)
    }

    /// Replaces each field whose env var is set to a non-empty value.
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, slot) in [
            (GLOBAL_S3_ENDPOINT_ENV, &mut self.s3_endpoint),
            (GLOBAL_S3_BUCKET_ENV, &mut self.s3_bucket),
            (
                GLOBAL_RESTORE_S3_ACCESS_KEY_ID_ENV,
                &mut self.restore_s3_access_key_id,
            ),
            (
                GLOBAL_RESTORE_S3_SECRET_ACCESS_KEY_ENV,
                &mut self.restore_s3_secret_access_key,
            ),
            (GLOBAL_RESTORE_S3_BUCKET_ENV, &mut self.restore_s3_bucket),
            (GLOBAL_RESTORE_S3_ENDPOINT_ENV, &mut self.restore_s3_endpoint),
        ] {
            if let Some(v) = lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
            {
                *slot = v;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn env_overrides_only_non_empty_values() {
        let base = GlobalConfig {
            s3_endpoint: "http://file:9000".into(),
            s3_bucket: "file-bucket".into(),
            ..Default::default()
        };
        let env: BTreeMap<&str, &str> = [
            (GLOBAL_S3_ENDPOINT_ENV, "http://env:9000"),
            (GLOBAL_S3_BUCKET_ENV, "  "),
            (GLOBAL_RESTORE_S3_BUCKET_ENV, "restores"),
        ]
        .into_iter()
        .collect();

        let cfg = base.overlay_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.s3_endpoint, "http://env:9000");
        assert_eq!(cfg.s3_bucket, "file-bucket");
        assert_eq!(cfg.restore_s3_bucket, "restores");
        assert_eq!(cfg.restore_s3_endpoint, "");
    }

    #[test]
    fn from_lookup_with_nothing_set_is_default() {
        assert_eq!(GlobalConfig::from_lookup(|_| None), GlobalConfig::default());
    }

    #[test]
    fn table_keys_are_camel_case() {
        let cfg: GlobalConfig = toml::from_str(
            r#"
s3Endpoint = "http://minio:9000"
restoreS3AccessKeyId = "restore/id"
s3_bucket = "ignored"
"#,
        )
        .expect("globals");
        assert_eq!(cfg.s3_endpoint, "http://minio:9000");
        assert_eq!(cfg.restore_s3_access_key_id, "restore/id");
        assert_eq!(cfg.s3_bucket, "");
    }
}
