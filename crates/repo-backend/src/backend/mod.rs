//! Storage backend selection for restic repositories.
//!
//! A [`BackendSpec`] may carry several variants at once. Exactly one of them is
//! used: the first populated kind in [`PRECEDENCE`]. Lower-precedence variants
//! are ignored without error; callers wanting strictness run
//! [`BackendSpec::validate`] first.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::env::{self, EnvMap, EnvVar};
use crate::error::{Error, Result};
use crate::globals::GlobalConfig;
use crate::secrets::{self, SecretStore};

pub mod variants;

pub use variants::{AzureSpec, B2Spec, GcsSpec, LocalSpec, RestServerSpec, S3Spec, SwiftSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    S3,
    Gcs,
    Azure,
    Swift,
    B2,
    Rest,
}

/// Tie-break order, highest priority first.
pub const PRECEDENCE: [BackendKind; 7] = [
    BackendKind::Azure,
    BackendKind::B2,
    BackendKind::Gcs,
    BackendKind::Local,
    BackendKind::Rest,
    BackendKind::S3,
    BackendKind::Swift,
];

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::Azure => "azure",
            BackendKind::Swift => "swift",
            BackendKind::B2 => "b2",
            BackendKind::Rest => "rest",
        }
    }

    /// Credential env keys this kind can contribute, in insertion order.
    pub fn env_keys(self) -> &'static [&'static str] {
        match self {
            BackendKind::Local => LocalSpec::ENV_KEYS,
            BackendKind::S3 => S3Spec::ENV_KEYS,
            BackendKind::Gcs => GcsSpec::ENV_KEYS,
            BackendKind::Azure => AzureSpec::ENV_KEYS,
            BackendKind::Swift => SwiftSpec::ENV_KEYS,
            BackendKind::B2 => B2Spec::ENV_KEYS,
            BackendKind::Rest => RestServerSpec::ENV_KEYS,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by every backend variant.
///
/// `env_vars` is generated by `#[Variant]`; `repository` forwards to the
/// variant's own `render`.
pub trait Variant {
    const KIND: BackendKind;
    const ENV_KEYS: &'static [&'static str];

    /// Adds this variant's credential references to `vars`.
    fn env_vars(&self, vars: EnvMap) -> EnvMap;

    /// Canonical restic repository string.
    fn repository(&self, globals: &GlobalConfig) -> String;
}

/// The one variant chosen out of a [`BackendSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend<'a> {
    Local(&'a LocalSpec),
    S3(&'a S3Spec),
    Gcs(&'a GcsSpec),
    Azure(&'a AzureSpec),
    Swift(&'a SwiftSpec),
    B2(&'a B2Spec),
    Rest(&'a RestServerSpec),
}

impl ActiveBackend<'_> {
    pub fn kind(&self) -> BackendKind {
        match self {
            ActiveBackend::Local(_) => LocalSpec::KIND,
            ActiveBackend::S3(_) => S3Spec::KIND,
            ActiveBackend::Gcs(_) => GcsSpec::KIND,
            ActiveBackend::Azure(_) => AzureSpec::KIND,
            ActiveBackend::Swift(_) => SwiftSpec::KIND,
            ActiveBackend::B2(_) => B2Spec::KIND,
            ActiveBackend::Rest(_) => RestServerSpec::KIND,
        }
    }

    pub fn repository(&self, globals: &GlobalConfig) -> String {
        match self {
            ActiveBackend::Local(v) => v.repository(globals),
            ActiveBackend::S3(v) => v.repository(globals),
            ActiveBackend::Gcs(v) => v.repository(globals),
            ActiveBackend::Azure(v) => v.repository(globals),
            ActiveBackend::Swift(v) => v.repository(globals),
            ActiveBackend::B2(v) => v.repository(globals),
            ActiveBackend::Rest(v) => v.repository(globals),
        }
    }

    pub fn env_vars(&self, vars: EnvMap) -> EnvMap {
        match self {
            ActiveBackend::Local(v) => v.env_vars(vars),
            ActiveBackend::S3(v) => v.env_vars(vars),
            ActiveBackend::Gcs(v) => v.env_vars(vars),
            ActiveBackend::Azure(v) => v.env_vars(vars),
            ActiveBackend::Swift(v) => v.env_vars(vars),
            ActiveBackend::B2(v) => v.env_vars(vars),
            ActiveBackend::Rest(v) => v.env_vars(vars),
        }
    }
}

/// Backend section of a backup resource. Users are expected to fill in only
/// one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendSpec {
    /// Secret key holding the restic repository password.
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "variants::null_as_empty"
    )]
    pub repo_password_secret_ref: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "variants::null_as_empty"
    )]
    pub restic_options: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Spec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift: Option<SwiftSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b2: Option<B2Spec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestServerSpec>,
}

impl BackendSpec {
    pub fn variant(&self, kind: BackendKind) -> Option<ActiveBackend<'_>> {
        match kind {
            BackendKind::Local => self.local.as_ref().map(ActiveBackend::Local),
            BackendKind::S3 => self.s3.as_ref().map(ActiveBackend::S3),
            BackendKind::Gcs => self.gcs.as_ref().map(ActiveBackend::Gcs),
            BackendKind::Azure => self.azure.as_ref().map(ActiveBackend::Azure),
            BackendKind::Swift => self.swift.as_ref().map(ActiveBackend::Swift),
            BackendKind::B2 => self.b2.as_ref().map(ActiveBackend::B2),
            BackendKind::Rest => self.rest.as_ref().map(ActiveBackend::Rest),
        }
    }

    /// Populated kinds in precedence order.
    pub fn populated(&self) -> Vec<BackendKind> {
        PRECEDENCE
            .into_iter()
            .filter(|k| self.variant(*k).is_some())
            .collect()
    }

    pub fn active(&self) -> Option<ActiveBackend<'_>> {
        let mut populated = PRECEDENCE.into_iter().filter_map(|k| self.variant(k));
        let active = populated.next()?;
        let ignored: Vec<BackendKind> = populated.map(|b| b.kind()).collect();
        if !ignored.is_empty() {
            debug!(
                selected = %active.kind(),
                ignored = ?ignored,
                "multiple backends configured; lower precedence ones are ignored"
            );
        }
        Some(active)
    }

    /// Canonical repository string, or `""` when no backend is configured.
    pub fn repository(&self, globals: &GlobalConfig) -> String {
        self.active()
            .map(|b| b.repository(globals))
            .unwrap_or_default()
    }

    /// Credential references of the active backend; `None` when no backend is
    /// configured.
    pub fn credential_env(&self) -> Option<EnvMap> {
        self.active().map(|b| b.env_vars(EnvMap::new()))
    }

    /// Like [`credential_env`](Self::credential_env), but with every reference
    /// replaced by its value from `store`.
    pub fn resolve_credential_env(&self, store: &dyn SecretStore) -> Result<Option<EnvMap>> {
        self.credential_env()
            .map(|vars| secrets::resolve_env(store, &vars))
            .transpose()
    }

    /// Restore-job environment. Always targets the S3 slot; an absent slot is
    /// treated as an empty S3 spec so the global restore defaults apply.
    pub fn restore_env_vars(&self, globals: &GlobalConfig) -> BTreeMap<String, EnvVar> {
        match &self.s3 {
            Some(s3) => s3.restore_env_vars(globals),
            None => {
                if let Some(active) = self.active() {
                    warn!(
                        active = %active.kind(),
                        "restore env requested for a non-S3 backend; using global restore defaults"
                    );
                }
                S3Spec::default().restore_env_vars(globals)
            }
        }
    }

    /// Environment for a backup job: credentials plus the restic repository,
    /// password reference and options when set.
    pub fn job_env(&self, globals: &GlobalConfig) -> EnvMap {
        let mut vars = self.credential_env().unwrap_or_default();
        env::insert_if_set(&mut vars, env::RESTIC_REPOSITORY, &self.repository(globals));
        env::add_env_var_from_secret(&mut vars, env::RESTIC_PASSWORD, self.restic_password());
        env::insert_if_set(&mut vars, env::RESTIC_OPTIONS, self.restic_options());
        vars
    }

    /// Two specs are equal when they resolve to the same repository string.
    /// `None` is never equal. Two specs with no backend compare equal.
    pub fn is_backend_equal_to(&self, other: Option<&BackendSpec>, globals: &GlobalConfig) -> bool {
        let Some(other) = other else {
            return false;
        };
        self.repository(globals) == other.repository(globals)
    }

    pub fn restic_password(&self) -> &str {
        &self.repo_password_secret_ref
    }

    pub fn restic_options(&self) -> &str {
        &self.restic_options
    }

    /// Rejects specs that do not configure exactly one backend.
    pub fn validate(&self) -> Result<BackendKind> {
        let populated = self.populated();
        match populated.as_slice() {
            [] => Err(Error::validation("no storage backend configured")),
            [only] => Ok(*only),
            many => {
                let names = many
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(Error::validation(format!(
                    "multiple storage backends configured ({names}); configure exactly one"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn globals() -> GlobalConfig {
        GlobalConfig {
            s3_endpoint: "minio:9000".into(),
            s3_bucket: "backups".into(),
            ..Default::default()
        }
    }

    fn all_variants() -> BackendSpec {
        BackendSpec {
            local: Some(LocalSpec {
                mount_path: "/data".into(),
            }),
            s3: Some(S3Spec::default()),
            gcs: Some(GcsSpec {
                bucket: "g".into(),
                ..Default::default()
            }),
            azure: Some(AzureSpec {
                container: "a".into(),
                ..Default::default()
            }),
            swift: Some(SwiftSpec::default()),
            b2: Some(B2Spec {
                bucket: "b".into(),
                ..Default::default()
            }),
            rest: Some(RestServerSpec {
                url: "http://r".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn precedence_walks_down_as_variants_are_removed() {
        let g = globals();
        let mut spec = all_variants();
        let mut seen = Vec::new();
        while let Some(active) = spec.active() {
            seen.push(active.kind());
            match active.kind() {
                BackendKind::Azure => spec.azure = None,
                BackendKind::B2 => spec.b2 = None,
                BackendKind::Gcs => spec.gcs = None,
                BackendKind::Local => spec.local = None,
                BackendKind::Rest => spec.rest = None,
                BackendKind::S3 => spec.s3 = None,
                BackendKind::Swift => spec.swift = None,
            }
        }
        assert_eq!(seen, PRECEDENCE.to_vec());
        assert_eq!(spec.repository(&g), "");
        assert_eq!(spec.credential_env(), None);
    }

    #[test]
    fn empty_nested_record_counts_as_populated() {
        let spec = BackendSpec {
            swift: Some(SwiftSpec::default()),
            ..Default::default()
        };
        assert_eq!(spec.active().map(|b| b.kind()), Some(BackendKind::Swift));
        assert_eq!(spec.repository(&GlobalConfig::default()), "swift::");
        assert_eq!(spec.credential_env(), Some(EnvMap::new()));
    }

    #[test]
    fn azure_wins_over_s3() {
        let spec = BackendSpec {
            azure: Some(AzureSpec {
                container: "c".into(),
                account_key_secret_ref: "az/key".into(),
                ..Default::default()
            }),
            s3: Some(S3Spec {
                access_key_id_secret_ref: "s3/id".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(spec.repository(&globals()), "azure:c:/");
        let vars = spec.credential_env().expect("credentials");
        assert_eq!(vars.len(), 1);
        assert_eq!(
            vars.get(env::AZURE_ACCOUNT_KEY).map(String::as_str),
            Some("az/key")
        );
    }

    #[test]
    fn equality_is_by_repository_string() {
        let g = globals();
        let explicit = BackendSpec {
            s3: Some(S3Spec {
                endpoint: "minio:9000".into(),
                bucket: "backups".into(),
                access_key_id_secret_ref: "one".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let defaulted = BackendSpec {
            s3: Some(S3Spec::default()),
            repo_password_secret_ref: "other".into(),
            ..Default::default()
        };
        assert!(explicit.is_backend_equal_to(Some(&defaulted), &g));
        assert!(defaulted.is_backend_equal_to(Some(&explicit), &g));
        assert!(!explicit.is_backend_equal_to(None, &g));

        let empty = BackendSpec::default();
        assert!(empty.is_backend_equal_to(Some(&BackendSpec::default()), &g));
        assert!(!empty.is_backend_equal_to(None, &g));
    }

    #[test]
    fn accessors_pass_through() {
        let spec = BackendSpec {
            repo_password_secret_ref: "restic-repo/password".into(),
            restic_options: "--limit-upload 100".into(),
            ..Default::default()
        };
        assert_eq!(spec.restic_password(), "restic-repo/password");
        assert_eq!(spec.restic_options(), "--limit-upload 100");
        assert_eq!(BackendSpec::default().restic_password(), "");
        assert_eq!(BackendSpec::default().restic_options(), "");
    }

    #[test]
    fn validate_requires_exactly_one() {
        let err = BackendSpec::default().validate().expect_err("none configured");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = all_variants().validate().expect_err("all configured");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("azure, b2, gcs, local, rest, s3, swift"));

        let one = BackendSpec {
            b2: Some(B2Spec::default()),
            ..Default::default()
        };
        assert_eq!(one.validate().expect("one configured"), BackendKind::B2);
    }

    #[test]
    fn job_env_adds_repository_password_and_options() {
        let spec = BackendSpec {
            repo_password_secret_ref: "repo/pass".into(),
            s3: Some(S3Spec {
                access_key_id_secret_ref: "s3/id".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let vars = spec.job_env(&globals());
        assert_eq!(
            vars.get(env::RESTIC_REPOSITORY).map(String::as_str),
            Some("s3:minio:9000/backups")
        );
        assert_eq!(vars.get(env::RESTIC_PASSWORD).map(String::as_str), Some("repo/pass"));
        assert_eq!(vars.get(env::AWS_ACCESS_KEY_ID).map(String::as_str), Some("s3/id"));
        assert!(!vars.contains_key(env::RESTIC_OPTIONS));

        assert!(BackendSpec::default().job_env(&globals()).is_empty());
    }

    #[test]
    fn active_kind_matches_variant_kind() {
        let spec = all_variants();
        for kind in PRECEDENCE {
            let active = spec.variant(kind).expect("populated");
            assert_eq!(active.kind(), kind);
        }
        assert_eq!(S3Spec::KIND, BackendKind::S3);
        assert_eq!(RestServerSpec::KIND, BackendKind::Rest);
    }

    #[test]
    fn null_scalars_read_as_empty() {
        let spec: BackendSpec = serde_json::from_str(
            r#"{"repoPasswordSecretRef":null,"resticOptions":null,"local":null,"gcs":{"bucket":"b","projectIDSecretRef":null}}"#,
        )
        .expect("backend spec");
        assert_eq!(spec.restic_password(), "");
        assert_eq!(spec.restic_options(), "");
        assert_eq!(spec.local, None);
        assert_eq!(spec.repository(&GlobalConfig::default()), "gs:b:/");
    }

    #[test]
    fn job_env_sets_options_when_present() {
        let spec = BackendSpec {
            restic_options: "--no-lock".into(),
            local: Some(LocalSpec {
                mount_path: "/mnt/repo".into(),
            }),
            ..Default::default()
        };
        let vars = spec.job_env(&GlobalConfig::default());
        assert_eq!(vars.get(env::RESTIC_OPTIONS).map(String::as_str), Some("--no-lock"));
        assert_eq!(vars.get(env::RESTIC_REPOSITORY).map(String::as_str), Some("/mnt/repo"));
        assert!(!vars.contains_key(env::RESTIC_PASSWORD));
    }

    #[test]
    fn env_keys_by_kind() {
        assert_eq!(
            BackendKind::S3.env_keys(),
            &[env::AWS_ACCESS_KEY_ID, env::AWS_SECRET_ACCESS_KEY]
        );
        assert_eq!(BackendKind::Rest.env_keys(), &[env::REST_PASSWORD, env::REST_USER]);
        assert!(BackendKind::Local.env_keys().is_empty());
    }
}
