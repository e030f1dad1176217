//! Per-kind inclusion rules
//!
//! Each collected object is checked against the rule registered for its kind.
//! Kinds without a rule are always included. Rules that need another object
//! (the claim behind a volume, the bindings behind a role) fetch it through
//! the `TypedPeek` in the `RuleContext`.
//!
//! | Kind               | Included when                                            |
//! |--------------------|----------------------------------------------------------|
//! | Service            | name is not the default API service                      |
//! | ServiceAccount     | name is not the default service account                  |
//! | PersistentVolumeClaim | claim is Bound and owned by this backend              |
//! | PersistentVolume   | Bound to an owned claim in the target namespace whose    |
//! |                    | labels satisfy the selector                              |
//! | ClusterRoleBinding | a subject lives in the target namespace                  |
//! | ClusterRole        | a binding to it has a subject in the target namespace    |

use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use tokio::sync::OnceCell;

use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::object::ResourceObject;
use crate::ownership::OwnershipOracle;
use crate::peek::TypedPeek;
use crate::selector::LabelSelector;
use crate::{
    CLUSTER_ROLE, CLUSTER_ROLE_BINDING, PERSISTENT_VOLUME, PERSISTENT_VOLUME_CLAIM, SERVICE,
    SERVICE_ACCOUNT,
};

const PHASE_BOUND: &str = "Bound";

/// Outcome of an inclusion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Collect the object
    Include,
    /// Skip the object, with the reason
    Exclude(&'static str),
}

/// Cluster role bindings listed at most once per collection call
#[derive(Debug, Default)]
pub struct BindingCache {
    bindings: OnceCell<Vec<ClusterRoleBinding>>,
}

impl BindingCache {
    /// All cluster role bindings, listing them on first use
    pub async fn get(&self, peek: &dyn TypedPeek) -> Result<&[ClusterRoleBinding], CollectError> {
        self.bindings
            .get_or_try_init(|| peek.list_cluster_role_bindings())
            .await
            .map(Vec::as_slice)
    }
}

/// Everything a rule may consult while deciding on one object
pub struct RuleContext<'a> {
    /// Namespace the object is being collected for
    pub namespace: &'a str,
    /// Label selector of the collection call
    pub selector: &'a LabelSelector,
    /// Typed lookups
    pub peek: &'a dyn TypedPeek,
    /// Storage ownership
    pub ownership: &'a dyn OwnershipOracle,
    /// Per-call binding cache
    pub bindings: &'a BindingCache,
}

/// An inclusion rule for one kind
#[async_trait]
pub trait InclusionRule: Send + Sync {
    /// Decide whether `object` is collected for `ctx.namespace`
    async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError>;
}

/// Lookup table from kind to inclusion rule
pub struct RuleTable {
    rules: HashMap<String, Box<dyn InclusionRule>>,
}

impl RuleTable {
    /// A table with no rules; every object is included
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The migration rules, with default object names taken from `config`
    pub fn standard(config: &CollectorConfig) -> Self {
        let mut table = Self::empty();
        table.register(
            SERVICE,
            ReservedName::new(&config.default_service_name, "default API service"),
        );
        table.register(
            SERVICE_ACCOUNT,
            ReservedName::new(
                &config.default_service_account_name,
                "default service account",
            ),
        );
        table.register(PERSISTENT_VOLUME_CLAIM, ClaimRule);
        table.register(PERSISTENT_VOLUME, VolumeRule);
        table.register(CLUSTER_ROLE_BINDING, ClusterRoleBindingRule);
        table.register(CLUSTER_ROLE, ClusterRoleRule);
        table
    }

    /// Register `rule` for `kind`, replacing any existing rule
    pub fn register(&mut self, kind: impl Into<String>, rule: impl InclusionRule + 'static) {
        self.rules.insert(kind.into(), Box::new(rule));
    }

    /// Whether `kind` has a registered rule
    pub fn has_rule(&self, kind: &str) -> bool {
        self.rules.contains_key(kind)
    }

    /// Evaluate the rule for the object's kind
    pub async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        match self.rules.get(object.kind()) {
            Some(rule) => rule.evaluate(object, ctx).await,
            None => Ok(Verdict::Include),
        }
    }
}

/// Excludes the one object every namespace carries under a fixed name
pub struct ReservedName {
    name: String,
    reason: &'static str,
}

impl ReservedName {
    /// Exclude objects named `name`
    pub fn new(name: impl Into<String>, reason: &'static str) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }
}

#[async_trait]
impl InclusionRule for ReservedName {
    async fn evaluate(
        &self,
        object: &ResourceObject,
        _ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        if object.name() == self.name {
            Ok(Verdict::Exclude(self.reason))
        } else {
            Ok(Verdict::Include)
        }
    }
}

/// Claims: Bound and owned by this backend
pub struct ClaimRule;

#[async_trait]
impl InclusionRule for ClaimRule {
    async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        let namespace = object.namespace().unwrap_or(ctx.namespace);
        let claim = ctx.peek.get_claim(object.name(), namespace).await?;

        if !is_bound(&claim) {
            return Ok(Verdict::Exclude("claim is not bound"));
        }
        if !ctx.ownership.owns(&claim).await? {
            return Ok(Verdict::Exclude("claim is not owned by this backend"));
        }
        Ok(Verdict::Include)
    }
}

/// Volumes: judged by the claim they are bound to
///
/// Volumes do not carry their claim's labels, so the selector is applied to
/// the claim instead.
pub struct VolumeRule;

#[async_trait]
impl InclusionRule for VolumeRule {
    async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        if object.find_str("status.phase")? != Some(PHASE_BOUND) {
            return Ok(Verdict::Exclude("volume is not bound"));
        }
        if object.find_map("spec.claimRef")?.is_none() {
            return Ok(Verdict::Exclude("volume has no claim reference"));
        }

        let claim_name = object.get_str("spec.claimRef.name")?;
        if object.find_str("spec.claimRef.namespace")? != Some(ctx.namespace) {
            return Ok(Verdict::Exclude("claim is in another namespace"));
        }

        let claim = ctx.peek.get_claim(claim_name, ctx.namespace).await?;
        if !ctx.ownership.owns(&claim).await? {
            return Ok(Verdict::Exclude("claim is not owned by this backend"));
        }

        if !ctx.selector.is_empty() {
            let labels = claim.metadata.labels.clone().unwrap_or_default();
            if labels.is_empty() {
                return Ok(Verdict::Exclude("claim has no labels"));
            }
            if !ctx.selector.matches(&labels) {
                return Ok(Verdict::Exclude("claim labels do not match selector"));
            }
        }
        Ok(Verdict::Include)
    }
}

/// Cluster role bindings: some subject lives in the target namespace
pub struct ClusterRoleBindingRule;

#[async_trait]
impl InclusionRule for ClusterRoleBindingRule {
    async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        let binding = ctx.peek.get_cluster_role_binding(object.name()).await?;
        if has_subject_in(&binding, ctx.namespace) {
            Ok(Verdict::Include)
        } else {
            Ok(Verdict::Exclude("no subject in namespace"))
        }
    }
}

/// Cluster roles: bound to a subject in the target namespace
pub struct ClusterRoleRule;

#[async_trait]
impl InclusionRule for ClusterRoleRule {
    async fn evaluate(
        &self,
        object: &ResourceObject,
        ctx: &RuleContext<'_>,
    ) -> Result<Verdict, CollectError> {
        let bindings = ctx.bindings.get(ctx.peek).await?;
        let bound = bindings
            .iter()
            .any(|b| b.role_ref.name == object.name() && has_subject_in(b, ctx.namespace));
        if bound {
            Ok(Verdict::Include)
        } else {
            Ok(Verdict::Exclude("no binding to a subject in namespace"))
        }
    }
}

fn is_bound(claim: &PersistentVolumeClaim) -> bool {
    claim
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == PHASE_BOUND)
}

fn has_subject_in(binding: &ClusterRoleBinding, namespace: &str) -> bool {
    binding
        .subjects
        .iter()
        .flatten()
        .any(|s| s.namespace.as_deref() == Some(namespace))
}
