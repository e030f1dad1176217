//! API discovery: which kinds exist in which group/version

use async_trait::async_trait;
use kube::discovery::{ApiResource, Discovery, Scope};
use kube::Client;
use parking_lot::RwLock;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::error::CollectError;

/// A listable kind in one group/version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDescriptor {
    /// API group ("" for the core group)
    pub group: String,
    /// API version (e.g., "v1")
    pub version: String,
    /// Kind (e.g., "PersistentVolumeClaim")
    pub kind: String,
    /// Plural resource name (e.g., "persistentvolumeclaims")
    pub plural: String,
    /// Whether objects of this kind live in a namespace
    pub namespaced: bool,
}

impl KindDescriptor {
    /// apiVersion string for objects of this kind ("v1", "apps/v1")
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// kube-rs resource handle for dynamic API calls
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// The kinds served under one group/version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersion {
    /// API group ("" for the core group)
    pub group: String,
    /// API version
    pub version: String,
    /// Kinds served at this group/version
    pub kinds: Vec<KindDescriptor>,
}

/// Enumerates the kinds installed in a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Re-read the set of installed kinds
    async fn refresh(&self) -> Result<(), CollectError>;

    /// Every group/version seen by the last refresh
    fn groups(&self) -> Vec<GroupVersion>;
}

/// Discovery backed by the API server's discovery endpoints
pub struct KubeDiscovery {
    client: Client,
    snapshot: RwLock<Vec<GroupVersion>>,
}

impl KubeDiscovery {
    /// Create a provider with an empty snapshot; call `refresh` before use
    pub fn new(client: Client) -> Self {
        Self {
            client,
            snapshot: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DiscoveryProvider for KubeDiscovery {
    async fn refresh(&self) -> Result<(), CollectError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| CollectError::Discovery(format!("API discovery failed: {}", e)))?;

        let mut groups = Vec::new();
        for api_group in discovery.groups() {
            for version in api_group.versions() {
                let kinds = api_group
                    .versioned_resources(version)
                    .into_iter()
                    .map(|(ar, caps)| KindDescriptor {
                        group: ar.group,
                        version: ar.version,
                        kind: ar.kind,
                        plural: ar.plural,
                        namespaced: caps.scope == Scope::Namespaced,
                    })
                    .collect();
                groups.push(GroupVersion {
                    group: api_group.name().to_string(),
                    version: version.to_string(),
                    kinds,
                });
            }
        }

        debug!(group_versions = groups.len(), "Refreshed API discovery");
        *self.snapshot.write() = groups;
        Ok(())
    }

    fn groups(&self) -> Vec<GroupVersion> {
        self.snapshot.read().clone()
    }
}
