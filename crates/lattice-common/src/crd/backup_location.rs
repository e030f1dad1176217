//! BackupLocation Custom Resource Definition
//!
//! A BackupLocation names an object store (S3, Azure Blob, GCS) that collected
//! resources are written to. Credentials may be given inline or pulled from a
//! Secret in the same namespace via `secretConfig`; values found in the Secret
//! override inline ones.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::{Client, CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kube_utils::secret_string_data;
use crate::Error;

/// Endpoint used when an S3 location is resolved from a secret without inline config
pub const DEFAULT_S3_ENDPOINT: &str = "s3.amazonaws.com";
/// Region used when an S3 location is resolved from a secret without inline config
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Object store type for a backup location
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupLocationType {
    /// S3-compatible object store
    #[default]
    S3,
    /// Azure Blob Storage
    Azure,
    /// Google Cloud Storage
    Google,
}

impl std::fmt::Display for BackupLocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Azure => write!(f, "azure"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Connection settings for an S3-compatible object store
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    /// Endpoint host (e.g., "s3.amazonaws.com" or a MinIO address)
    #[serde(default)]
    pub endpoint: String,

    /// Access key ID
    #[serde(default, rename = "accessKeyID")]
    pub access_key_id: String,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,

    /// Bucket region
    #[serde(default)]
    pub region: String,
}

impl S3Config {
    fn with_defaults() -> Self {
        Self {
            endpoint: DEFAULT_S3_ENDPOINT.to_string(),
            region: DEFAULT_S3_REGION.to_string(),
            ..Default::default()
        }
    }
}

/// Connection settings for Azure Blob Storage
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfig {
    /// Storage account name
    #[serde(default)]
    pub storage_account_name: String,

    /// Storage account key
    #[serde(default)]
    pub storage_account_key: String,
}

/// Connection settings for Google Cloud Storage
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleConfig {
    /// GCP project ID
    #[serde(default, rename = "projectID")]
    pub project_id: String,

    /// Service account key (JSON)
    #[serde(default)]
    pub account_key: String,
}

/// Specification for a BackupLocation
///
/// Only the config matching `type` is consulted; the others are ignored.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "lattice.dev",
    version = "v1alpha1",
    kind = "BackupLocation",
    plural = "backuplocations",
    shortname = "bl",
    namespaced,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Path","type":"string","jsonPath":".spec.path"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupLocationSpec {
    /// Object store type
    #[serde(rename = "type")]
    pub location_type: BackupLocationType,

    /// Bucket, container, or other path within the store
    #[serde(default)]
    pub path: String,

    /// S3 settings (when type is s3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_config: Option<S3Config>,

    /// Azure settings (when type is azure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_config: Option<AzureConfig>,

    /// Google settings (when type is google)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_config: Option<GoogleConfig>,

    /// Name of a Secret in the same namespace holding connection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_config: Option<String>,
}

impl BackupLocationSpec {
    /// Overlay connection settings read from a secret onto the config for `type`
    ///
    /// Every key present in `data` replaces the matching field; absent keys
    /// leave inline values alone. One trailing newline is trimmed from each
    /// value since secrets are often created from files.
    pub fn merge_secret_data(&mut self, data: &BTreeMap<String, String>) {
        let value = |key: &str| data.get(key).map(|v| trim_newline(v).to_string());

        match self.location_type {
            BackupLocationType::S3 => {
                let s3 = self.s3_config.get_or_insert_with(S3Config::with_defaults);
                if let Some(v) = value("endpoint") {
                    s3.endpoint = v;
                }
                if let Some(v) = value("accessKeyID") {
                    s3.access_key_id = v;
                }
                if let Some(v) = value("secretAccessKey") {
                    s3.secret_access_key = v;
                }
                if let Some(v) = value("region") {
                    s3.region = v;
                }
            }
            BackupLocationType::Azure => {
                let azure = self.azure_config.get_or_insert_with(AzureConfig::default);
                if let Some(v) = value("storageAccountName") {
                    azure.storage_account_name = v;
                }
                if let Some(v) = value("storageAccountKey") {
                    azure.storage_account_key = v;
                }
            }
            BackupLocationType::Google => {
                let google = self.google_config.get_or_insert_with(GoogleConfig::default);
                if let Some(v) = value("projectID") {
                    google.project_id = v;
                }
                if let Some(v) = value("accountKey") {
                    google.account_key = v;
                }
            }
        }
    }
}

impl BackupLocation {
    /// Namespace and name of the Secret named by `secretConfig`
    ///
    /// `None` when the location has no secret reference. A location without a
    /// namespace cannot reference one.
    pub fn secret_ref(&self) -> Result<Option<(String, String)>, Error> {
        let secret_name = match &self.spec.secret_config {
            Some(name) if !name.is_empty() => name.clone(),
            _ => return Ok(None),
        };
        let namespace = self.namespace().ok_or_else(|| {
            Error::validation_for_field(
                self.name_any(),
                "metadata.namespace",
                "BackupLocation must be namespaced to resolve secretConfig",
            )
        })?;
        Ok(Some((namespace, secret_name)))
    }

    /// Merge a fetched `secretConfig` Secret into the spec
    pub fn apply_secret(
        &mut self,
        namespace: &str,
        secret_name: &str,
        secret: Option<Secret>,
    ) -> Result<(), Error> {
        let secret = secret.ok_or_else(|| {
            Error::secret_config(namespace, secret_name, "referenced by secretConfig but not found")
        })?;

        let data = secret_string_data(&secret);
        debug!(
            location = %self.name_any(),
            secret = %secret_name,
            keys = data.len(),
            "Merging backup location settings from secret"
        );
        self.spec.merge_secret_data(&data);
        Ok(())
    }

    /// Resolve connection settings from `secretConfig`, if set
    ///
    /// No-op when the location has no secret reference.
    pub async fn resolve_from_secret(&mut self, client: &Client) -> Result<(), Error> {
        let Some((namespace, secret_name)) = self.secret_ref()? else {
            return Ok(());
        };
        let api: Api<Secret> = Api::namespaced(client.clone(), &namespace);
        let secret = api.get_opt(&secret_name).await?;
        self.apply_secret(&namespace, &secret_name, secret)
    }
}

fn trim_newline(value: &str) -> &str {
    value.strip_suffix('\n').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn spec(location_type: BackupLocationType) -> BackupLocationSpec {
        BackupLocationSpec {
            location_type,
            path: "backups".to_string(),
            s3_config: None,
            azure_config: None,
            google_config: None,
            secret_config: Some("store-creds".to_string()),
        }
    }

    #[test]
    fn test_parse_backup_location_spec() {
        let spec: BackupLocationSpec = serde_json::from_value(serde_json::json!({
            "type": "s3",
            "path": "cluster-backups",
            "s3Config": {
                "endpoint": "minio.minio-system.svc:9000",
                "accessKeyID": "AKIA",
                "secretAccessKey": "shh",
                "region": "eu-west-1"
            },
            "secretConfig": "minio-creds"
        }))
        .expect("parse spec");

        assert_eq!(spec.location_type, BackupLocationType::S3);
        let s3 = spec.s3_config.expect("s3 config");
        assert_eq!(s3.access_key_id, "AKIA");
        assert_eq!(s3.region, "eu-west-1");
        assert_eq!(spec.secret_config.as_deref(), Some("minio-creds"));
    }

    #[test]
    fn test_s3_secret_fills_defaults_and_region() {
        let mut spec = spec(BackupLocationType::S3);
        spec.merge_secret_data(&secret_data(&[
            ("accessKeyID", "AKIA\n"),
            ("secretAccessKey", "shh\n"),
            ("region", "ap-south-1\n"),
        ]));

        let s3 = spec.s3_config.expect("s3 config created");
        assert_eq!(s3.endpoint, DEFAULT_S3_ENDPOINT);
        assert_eq!(s3.access_key_id, "AKIA");
        // region lands in its own field and does not clobber the secret key
        assert_eq!(s3.region, "ap-south-1");
        assert_eq!(s3.secret_access_key, "shh");
    }

    #[test]
    fn test_s3_secret_defaults_region_when_absent() {
        let mut spec = spec(BackupLocationType::S3);
        spec.merge_secret_data(&secret_data(&[("endpoint", "minio:9000")]));

        let s3 = spec.s3_config.expect("s3 config created");
        assert_eq!(s3.endpoint, "minio:9000");
        assert_eq!(s3.region, DEFAULT_S3_REGION);
    }

    #[test]
    fn test_inline_values_survive_missing_keys() {
        let mut spec = spec(BackupLocationType::S3);
        spec.s3_config = Some(S3Config {
            endpoint: "inline:9000".to_string(),
            access_key_id: "inline-key".to_string(),
            secret_access_key: "inline-secret".to_string(),
            region: "inline-region".to_string(),
        });
        spec.merge_secret_data(&secret_data(&[("secretAccessKey", "from-secret")]));

        let s3 = spec.s3_config.expect("s3 config");
        assert_eq!(s3.endpoint, "inline:9000");
        assert_eq!(s3.access_key_id, "inline-key");
        assert_eq!(s3.secret_access_key, "from-secret");
        assert_eq!(s3.region, "inline-region");
    }

    #[test]
    fn test_azure_and_google_merge() {
        let mut azure = spec(BackupLocationType::Azure);
        azure.merge_secret_data(&secret_data(&[
            ("storageAccountName", "acct"),
            ("storageAccountKey", "key==\n"),
        ]));
        let cfg = azure.azure_config.expect("azure config");
        assert_eq!(cfg.storage_account_name, "acct");
        assert_eq!(cfg.storage_account_key, "key==");
        assert!(azure.s3_config.is_none());

        let mut google = spec(BackupLocationType::Google);
        google.merge_secret_data(&secret_data(&[
            ("projectID", "my-project"),
            ("accountKey", "{\"type\":\"service_account\"}"),
        ]));
        let cfg = google.google_config.expect("google config");
        assert_eq!(cfg.project_id, "my-project");
        assert_eq!(cfg.account_key, "{\"type\":\"service_account\"}");
    }

    #[test]
    fn test_only_one_trailing_newline_is_trimmed() {
        assert_eq!(trim_newline("value\n\n"), "value\n");
        assert_eq!(trim_newline("value"), "value");
    }

    fn location(namespace: Option<&str>, secret_config: Option<&str>) -> BackupLocation {
        let mut spec = spec(BackupLocationType::S3);
        spec.secret_config = secret_config.map(str::to_string);
        let mut location = BackupLocation::new("offsite", spec);
        location.metadata.namespace = namespace.map(str::to_string);
        location
    }

    #[test]
    fn test_no_secret_config_is_noop() {
        assert!(location(Some("ops"), None).secret_ref().unwrap().is_none());
        assert!(location(None, Some("")).secret_ref().unwrap().is_none());
    }

    #[test]
    fn test_secret_ref_requires_namespace() {
        let err = location(None, Some("store-creds")).secret_ref().unwrap_err();
        match &err {
            Error::Validation { field, .. } => assert_eq!(field, "metadata.namespace"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());

        let found = location(Some("ops"), Some("store-creds")).secret_ref().unwrap();
        assert_eq!(found, Some(("ops".to_string(), "store-creds".to_string())));
    }

    #[test]
    fn test_missing_secret_is_secret_config_error() {
        let mut loc = location(Some("ops"), Some("store-creds"));
        let err = loc.apply_secret("ops", "store-creds", None).unwrap_err();

        assert!(matches!(err, Error::SecretConfig { .. }));
        assert_eq!(
            err.to_string(),
            "secret ops/store-creds: referenced by secretConfig but not found"
        );
        assert!(loc.spec.s3_config.is_none());
    }

    #[test]
    fn test_fetched_secret_is_merged() {
        let mut loc = location(Some("ops"), Some("store-creds"));
        let secret = Secret {
            string_data: Some(secret_data(&[
                ("accessKeyID", "AKIA\n"),
                ("region", "eu-north-1"),
            ])),
            ..Default::default()
        };
        loc.apply_secret("ops", "store-creds", Some(secret)).unwrap();

        let s3 = loc.spec.s3_config.expect("s3 config");
        assert_eq!(s3.access_key_id, "AKIA");
        assert_eq!(s3.region, "eu-north-1");
        assert_eq!(s3.endpoint, DEFAULT_S3_ENDPOINT);
    }

    #[test]
    fn test_location_type_display() {
        assert_eq!(BackupLocationType::S3.to_string(), "s3");
        assert_eq!(BackupLocationType::Azure.to_string(), "azure");
        assert_eq!(BackupLocationType::Google.to_string(), "google");
    }
}
