//! Storage ownership: whether a claim belongs to this backend

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::Api;
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::error::CollectError;

/// Annotation set by the PV controller naming the claim's provisioner
pub const STORAGE_PROVISIONER_ANNOTATION: &str = "volume.kubernetes.io/storage-provisioner";

/// Pre-1.23 form of `STORAGE_PROVISIONER_ANNOTATION`
pub const BETA_STORAGE_PROVISIONER_ANNOTATION: &str =
    "volume.beta.kubernetes.io/storage-provisioner";

/// Decides whether a storage backend owns a claim
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    /// Whether this backend owns `claim`
    async fn owns(&self, claim: &PersistentVolumeClaim) -> Result<bool, CollectError>;
}

/// Reads the provisioner of a StorageClass
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageClassSource: Send + Sync {
    /// Provisioner of class `name`, `None` when the class does not exist
    async fn provisioner(&self, name: &str) -> Result<Option<String>, kube::Error>;
}

/// StorageClass reads through the API server
pub struct KubeStorageClasses {
    client: Client,
}

impl KubeStorageClasses {
    /// Create a source using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageClassSource for KubeStorageClasses {
    async fn provisioner(&self, name: &str) -> Result<Option<String>, kube::Error> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.map(|class| class.provisioner))
    }
}

/// Owns claims provisioned by one of a fixed set of provisioners
///
/// The provisioner comes from the claim's provisioner annotation, falling back
/// to the provisioner of its StorageClass.
pub struct ProvisionerOwnership {
    classes: Arc<dyn StorageClassSource>,
    provisioners: BTreeSet<String>,
}

impl ProvisionerOwnership {
    /// Create an oracle owning claims from any of `provisioners`
    pub fn new<I, S>(client: Client, provisioners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_storage_classes(Arc::new(KubeStorageClasses::new(client)), provisioners)
    }

    /// Create an oracle reading StorageClasses from `classes`
    pub fn with_storage_classes<I, S>(
        classes: Arc<dyn StorageClassSource>,
        provisioners: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes,
            provisioners: provisioners.into_iter().map(Into::into).collect(),
        }
    }

    async fn storage_class_provisioner(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<Option<String>, CollectError> {
        let Some(class_name) = claim
            .spec
            .as_ref()
            .and_then(|s| s.storage_class_name.as_deref())
            .filter(|name| !name.is_empty())
        else {
            return Ok(None);
        };

        self.classes
            .provisioner(class_name)
            .await
            .map_err(|e| CollectError::Ownership {
                namespace: claim.namespace().unwrap_or_default(),
                name: claim.name_any(),
                message: format!("failed to get StorageClass {}: {}", class_name, e),
            })
    }
}

#[async_trait]
impl OwnershipOracle for ProvisionerOwnership {
    async fn owns(&self, claim: &PersistentVolumeClaim) -> Result<bool, CollectError> {
        let provisioner = match annotated_provisioner(claim) {
            Some(p) => Some(p.to_string()),
            None => self.storage_class_provisioner(claim).await?,
        };

        let owned = provisioner
            .as_deref()
            .is_some_and(|p| self.provisioners.contains(p));

        debug!(
            claim = %claim.name_any(),
            namespace = %claim.namespace().unwrap_or_default(),
            provisioner = provisioner.as_deref().unwrap_or(""),
            owned,
            "Checked claim ownership"
        );
        Ok(owned)
    }
}

/// Provisioner named by the claim's annotations, preferring the GA key
pub fn annotated_provisioner(claim: &PersistentVolumeClaim) -> Option<&str> {
    let annotations = claim.metadata.annotations.as_ref()?;
    annotations
        .get(STORAGE_PROVISIONER_ANNOTATION)
        .or_else(|| annotations.get(BETA_STORAGE_PROVISIONER_ANNOTATION))
        .map(String::as_str)
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
    use std::collections::BTreeMap;

    fn claim_with(annotations: &[(&str, &str)]) -> PersistentVolumeClaim {
        let mut claim = PersistentVolumeClaim::default();
        claim.metadata.name = Some("data-pvc".to_string());
        claim.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        claim
    }

    #[test]
    fn test_ga_annotation_wins() {
        let claim = claim_with(&[
            (STORAGE_PROVISIONER_ANNOTATION, "ebs.csi.aws.com"),
            (BETA_STORAGE_PROVISIONER_ANNOTATION, "kubernetes.io/aws-ebs"),
        ]);
        assert_eq!(annotated_provisioner(&claim), Some("ebs.csi.aws.com"));
    }

    #[test]
    fn test_beta_annotation_fallback() {
        let claim = claim_with(&[(BETA_STORAGE_PROVISIONER_ANNOTATION, "pxd.portworx.com")]);
        assert_eq!(annotated_provisioner(&claim), Some("pxd.portworx.com"));
    }

    #[test]
    fn test_missing_or_empty_annotation() {
        assert_eq!(annotated_provisioner(&PersistentVolumeClaim::default()), None);
        let claim = claim_with(&[(STORAGE_PROVISIONER_ANNOTATION, "")]);
        assert_eq!(annotated_provisioner(&claim), None);
    }

    fn claim_of_class(class: Option<&str>) -> PersistentVolumeClaim {
        let mut claim = claim_with(&[]);
        claim.metadata.namespace = Some("ns1".to_string());
        claim.spec = Some(PersistentVolumeClaimSpec {
            storage_class_name: class.map(str::to_string),
            ..Default::default()
        });
        claim
    }

    fn oracle(classes: MockStorageClassSource) -> ProvisionerOwnership {
        ProvisionerOwnership::with_storage_classes(Arc::new(classes), ["ebs.csi.aws.com"])
    }

    #[tokio::test]
    async fn test_annotation_skips_storage_class_lookup() {
        let mut classes = MockStorageClassSource::new();
        classes.expect_provisioner().never();

        let owned = claim_with(&[(STORAGE_PROVISIONER_ANNOTATION, "ebs.csi.aws.com")]);
        let foreign = claim_with(&[(STORAGE_PROVISIONER_ANNOTATION, "pxd.portworx.com")]);
        let oracle = oracle(classes);

        assert!(oracle.owns(&owned).await.unwrap());
        assert!(!oracle.owns(&foreign).await.unwrap());
    }

    #[tokio::test]
    async fn test_falls_back_to_storage_class_provisioner() {
        let mut classes = MockStorageClassSource::new();
        classes
            .expect_provisioner()
            .withf(|name| name == "gp3")
            .times(1)
            .returning(|_| Ok(Some("ebs.csi.aws.com".to_string())));
        classes
            .expect_provisioner()
            .withf(|name| name == "local-path")
            .times(1)
            .returning(|_| Ok(Some("rancher.io/local-path".to_string())));
        let oracle = oracle(classes);

        assert!(oracle.owns(&claim_of_class(Some("gp3"))).await.unwrap());
        assert!(!oracle.owns(&claim_of_class(Some("local-path"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_annotation_and_no_class_is_not_owned() {
        let mut classes = MockStorageClassSource::new();
        classes
            .expect_provisioner()
            .withf(|name| name == "deleted")
            .times(1)
            .returning(|_| Ok(None));
        let oracle = oracle(classes);

        assert!(!oracle.owns(&claim_of_class(None)).await.unwrap());
        assert!(!oracle.owns(&claim_of_class(Some(""))).await.unwrap());
        assert!(!oracle.owns(&claim_of_class(Some("deleted"))).await.unwrap());
    }
}
