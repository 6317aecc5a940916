use repo_backend_macros::Variant;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::globals::GlobalConfig;

/// Reads a JSON `null` the same as an absent attribute: the empty string.
pub(crate) fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Option::unwrap_or_default)
}

/// Returns `own` unless it is empty, in which case the operator default is used.
pub(crate) fn or_global<'a>(own: &'a str, global: &'a str, what: &str) -> &'a str {
    if own.is_empty() {
        debug!(field = what, "unset on backend; using global default");
        global
    } else {
        own
    }
}

#[Variant(kind = Local)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub mount_path: String,
}

impl LocalSpec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        self.mount_path.clone()
    }
}

#[Variant(
    kind = S3,
    env = [
        "AWS_ACCESS_KEY_ID=access_key_id_secret_ref",
        "AWS_SECRET_ACCESS_KEY=secret_access_key_secret_ref",
    ]
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct S3Spec {
    #[serde(deserialize_with = "null_as_empty")]
    pub endpoint: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub bucket: String,
    #[serde(rename = "accessKeyIDSecretRef", deserialize_with = "null_as_empty")]
    pub access_key_id_secret_ref: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub secret_access_key_secret_ref: String,
}

impl S3Spec {
    // "s3:<endpoint>/<bucket>"; each half falls back on its own.
    fn render(&self, globals: &GlobalConfig) -> String {
        let endpoint = or_global(&self.endpoint, &globals.s3_endpoint, "s3.endpoint");
        let bucket = or_global(&self.bucket, &globals.s3_bucket, "s3.bucket");
        format!("s3:{endpoint}/{bucket}")
    }
}

#[Variant(
    kind = Gcs,
    env = [
        "GOOGLE_PROJECT_ID=project_id_secret_ref",
        "GOOGLE_ACCESS_TOKEN=access_token_secret_ref",
    ]
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GcsSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub bucket: String,
    #[serde(rename = "projectIDSecretRef", deserialize_with = "null_as_empty")]
    pub project_id_secret_ref: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub access_token_secret_ref: String,
}

impl GcsSpec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        format!("gs:{}:/", self.bucket)
    }
}

#[Variant(
    kind = Azure,
    env = [
        "AZURE_ACCOUNT_KEY=account_key_secret_ref",
        "AZURE_ACCOUNT_NAME=account_name_secret_ref",
    ]
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AzureSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub container: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub account_name_secret_ref: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub account_key_secret_ref: String,
}

impl AzureSpec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        format!("azure:{}:/", self.container)
    }
}

#[Variant(kind = Swift)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwiftSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub container: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub path: String,
}

impl SwiftSpec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        format!("swift:{}:{}", self.container, self.path)
    }
}

#[Variant(
    kind = B2,
    env = [
        "B2_ACCOUNT_ID=account_id_secret_ref",
        "B2_ACCOUNT_KEY=account_key_secret_ref",
    ]
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct B2Spec {
    #[serde(deserialize_with = "null_as_empty")]
    pub bucket: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub path: String,
    #[serde(rename = "accountIDSecretRef", deserialize_with = "null_as_empty")]
    pub account_id_secret_ref: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub account_key_secret_ref: String,
}

impl B2Spec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        format!("b2:{}:{}", self.bucket, self.path)
    }
}

#[Variant(
    kind = Rest,
    env = [
        "REST_PASSWORD=password_secret_ref",
        "REST_USER=user_secret_ref",
    ]
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestServerSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub user_secret_ref: String,
    // Serialized under its historical misspelling.
    #[serde(
        rename = "passwordSecretReg",
        alias = "passwordSecretRef",
        deserialize_with = "null_as_empty"
    )]
    pub password_secret_ref: String,
}

impl RestServerSpec {
    fn render(&self, _globals: &GlobalConfig) -> String {
        format!("rest:{}", self.url)
    }
}
