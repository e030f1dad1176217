//! Collector configuration

use std::collections::BTreeSet;

use crate::{
    CLUSTER_ROLE, CLUSTER_ROLE_BINDING, PERSISTENT_VOLUME, PERSISTENT_VOLUME_CLAIM, SERVICE,
    SERVICE_ACCOUNT,
};

/// Default number of namespaces evaluated concurrently per kind
pub const DEFAULT_NAMESPACE_CONCURRENCY: usize = 4;

/// Name of the API service every namespace carries implicitly
pub const DEFAULT_SERVICE_NAME: &str = "kubernetes";

/// Name of the service account every namespace carries implicitly
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "default";

/// Legacy API group whose kinds are mirrored under newer groups
pub const EXTENSIONS_GROUP: &str = "extensions";

/// Kinds collected for migration when no explicit list is given
pub const DEFAULT_COLLECTED_KINDS: &[&str] = &[
    PERSISTENT_VOLUME_CLAIM,
    PERSISTENT_VOLUME,
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ConfigMap",
    "Secret",
    SERVICE,
    SERVICE_ACCOUNT,
    CLUSTER_ROLE,
    CLUSTER_ROLE_BINDING,
];

/// Configuration for a `ResourceCollector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Kinds eligible for collection; all other discovered kinds are skipped
    pub collected_kinds: BTreeSet<String>,
    /// API groups never enumerated
    pub excluded_groups: BTreeSet<String>,
    /// Namespaces evaluated concurrently for one kind (at least 1)
    pub namespace_concurrency: usize,
    /// Service name excluded from every namespace
    pub default_service_name: String,
    /// Service account name excluded from every namespace
    pub default_service_account_name: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            collected_kinds: DEFAULT_COLLECTED_KINDS.iter().map(|k| k.to_string()).collect(),
            excluded_groups: BTreeSet::from([EXTENSIONS_GROUP.to_string()]),
            namespace_concurrency: DEFAULT_NAMESPACE_CONCURRENCY,
            default_service_name: DEFAULT_SERVICE_NAME.to_string(),
            default_service_account_name: DEFAULT_SERVICE_ACCOUNT_NAME.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Replace the collected kinds
    pub fn with_collected_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collected_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the excluded API groups
    pub fn with_excluded_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Set namespace concurrency; values below 1 are raised to 1
    pub fn with_namespace_concurrency(mut self, concurrency: usize) -> Self {
        self.namespace_concurrency = concurrency.max(1);
        self
    }

    /// Whether `kind` is on the collection allow-list
    pub fn collects(&self, kind: &str) -> bool {
        self.collected_kinds.contains(kind)
    }

    /// Whether `group` is never enumerated
    pub fn excludes_group(&self, group: &str) -> bool {
        self.excluded_groups.contains(group)
    }
}
