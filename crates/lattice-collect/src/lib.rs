//! Resource collection for migration, clone and backup
//!
//! Collects the objects of a set of namespaces that can be re-created in
//! another namespace or cluster, then strips whatever ties them to the origin.
//!
//! ## Flow
//!
//! ```text
//! DiscoveryProvider ──► ResourceCollector ──► ObjectLister (per kind / namespace)
//!                             │
//!                             ├─ RuleTable (per-kind inclusion, may consult
//!                             │    TypedPeek and OwnershipOracle)
//!                             ├─ dedupe by uid
//!                             ▼
//!                       prepare_resources ──► caller
//! ```
//!
//! The four collaborators are traits with kube-rs implementations
//! (`KubeDiscovery`, `KubeLister`, `KubePeek`, `ProvisionerOwnership`).

#![deny(missing_docs)]

mod collector;
pub mod config;
pub mod discovery;
mod error;
pub mod lister;
pub mod object;
pub mod ownership;
pub mod peek;
pub mod rules;
mod sanitize;
pub mod selector;

pub use collector::ResourceCollector;
pub use config::CollectorConfig;
pub use discovery::{DiscoveryProvider, GroupVersion, KindDescriptor, KubeDiscovery};
pub use error::CollectError;
pub use lister::{KubeLister, ObjectLister};
pub use object::ResourceObject;
pub use ownership::{
    KubeStorageClasses, OwnershipOracle, ProvisionerOwnership, StorageClassSource,
};
pub use peek::{KubePeek, TypedPeek};
pub use rules::{InclusionRule, RuleContext, RuleTable, Verdict};
pub use sanitize::{prepare_resource, prepare_resources};
pub use selector::LabelSelector;

/// Kind name of claims
pub const PERSISTENT_VOLUME_CLAIM: &str = "PersistentVolumeClaim";
/// Kind name of volumes
pub const PERSISTENT_VOLUME: &str = "PersistentVolume";
/// Kind name of services
pub const SERVICE: &str = "Service";
/// Kind name of service accounts
pub const SERVICE_ACCOUNT: &str = "ServiceAccount";
/// Kind name of cluster roles
pub const CLUSTER_ROLE: &str = "ClusterRole";
/// Kind name of cluster role bindings
pub const CLUSTER_ROLE_BINDING: &str = "ClusterRoleBinding";
