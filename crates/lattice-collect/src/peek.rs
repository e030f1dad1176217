//! Typed lookups for the few kinds whose fields the rules read directly

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::api::{Api, ListParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::error::CollectError;
use crate::{CLUSTER_ROLE_BINDING, PERSISTENT_VOLUME_CLAIM};

/// Typed claim and binding lookups
///
/// A missing object is reported as `CollectError::NotFound`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TypedPeek: Send + Sync {
    /// Fetch a claim
    async fn get_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<PersistentVolumeClaim, CollectError>;

    /// Fetch a cluster role binding
    async fn get_cluster_role_binding(&self, name: &str)
        -> Result<ClusterRoleBinding, CollectError>;

    /// List every cluster role binding
    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, CollectError>;
}

/// Typed lookups through the API server
pub struct KubePeek {
    client: Client,
}

impl KubePeek {
    /// Create a peek using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TypedPeek for KubePeek {
    async fn get_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<PersistentVolumeClaim, CollectError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        found(
            api.get_opt(name).await,
            PERSISTENT_VOLUME_CLAIM,
            Some(namespace),
            name,
        )
    }

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<ClusterRoleBinding, CollectError> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        found(api.get_opt(name).await, CLUSTER_ROLE_BINDING, None, name)
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, CollectError> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectError::List {
                kind: CLUSTER_ROLE_BINDING.to_string(),
                namespace: None,
                message: e.to_string(),
            })?;
        Ok(list.items)
    }
}

/// Turn a `get_opt` result into the object, `NotFound` or `Lookup`
fn found<T>(
    result: Result<Option<T>, kube::Error>,
    kind: &str,
    namespace: Option<&str>,
    name: &str,
) -> Result<T, CollectError> {
    let object = result.map_err(|e| CollectError::Lookup {
        kind: kind.to_string(),
        namespace: namespace.map(str::to_string),
        name: name.to_string(),
        message: e.to_string(),
    })?;
    object.ok_or_else(|| match namespace {
        Some(ns) => CollectError::not_found(kind, ns, name),
        None => CollectError::cluster_not_found(kind, name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_claim_is_not_found() {
        let missing: Result<Option<PersistentVolumeClaim>, kube::Error> = Ok(None);
        let err = found(missing, PERSISTENT_VOLUME_CLAIM, Some("ns1"), "data").unwrap_err();

        assert!(matches!(err, CollectError::NotFound { .. }));
        assert_eq!(err.to_string(), "PersistentVolumeClaim ns1/data not found");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_binding_is_cluster_not_found() {
        let missing: Result<Option<ClusterRoleBinding>, kube::Error> = Ok(None);
        let err = found(missing, CLUSTER_ROLE_BINDING, None, "db-admins").unwrap_err();

        match err {
            CollectError::NotFound { namespace, name, .. } => {
                assert_eq!(namespace, None);
                assert_eq!(name, "db-admins");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_present_object_is_returned() {
        let mut claim = PersistentVolumeClaim::default();
        claim.metadata.name = Some("data".to_string());

        let got = found(Ok(Some(claim)), PERSISTENT_VOLUME_CLAIM, Some("ns1"), "data").unwrap();
        assert_eq!(got.metadata.name.as_deref(), Some("data"));
    }
}
