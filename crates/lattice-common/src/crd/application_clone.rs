//! ApplicationClone Custom Resource Definition
//!
//! An ApplicationClone copies the collected resources of one or more source
//! namespaces into destination namespaces. The controller walks the stages in
//! order; this module only defines the record and its state machine.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Overall status of a clone
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CloneStatus {
    /// Not yet picked up
    #[default]
    #[serde(rename = "")]
    Initial,
    /// Accepted, waiting to start
    Pending,
    /// Clone is running
    InProgress,
    /// Clone failed
    Failed,
    /// Every resource was cloned
    Success,
    /// Some resources could not be cloned
    PartialSuccess,
}

impl CloneStatus {
    /// Whether the clone has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Success | Self::PartialSuccess)
    }
}

impl std::fmt::Display for CloneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Failed => write!(f, "Failed"),
            Self::Success => write!(f, "Success"),
            Self::PartialSuccess => write!(f, "PartialSuccess"),
        }
    }
}

/// Stage of a clone
///
/// Stages run in declaration order: rules wrap the volume and resource copies.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CloneStage {
    /// Nothing has run yet
    #[default]
    #[serde(rename = "")]
    Initial,
    /// Running the pre-exec rule in the source namespaces
    PreExecRule,
    /// Cloning volumes
    VolumeClone,
    /// Cloning the remaining resources
    ApplicationClone,
    /// Running the post-exec rule
    PostExecRule,
    /// All stages finished
    Done,
}

impl CloneStage {
    /// The stage that follows this one; `Done` is its own successor
    pub fn next(self) -> Self {
        match self {
            Self::Initial => Self::PreExecRule,
            Self::PreExecRule => Self::VolumeClone,
            Self::VolumeClone => Self::ApplicationClone,
            Self::ApplicationClone => Self::PostExecRule,
            Self::PostExecRule | Self::Done => Self::Done,
        }
    }
}

impl std::fmt::Display for CloneStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::PreExecRule => write!(f, "PreExecRule"),
            Self::VolumeClone => write!(f, "VolumeClone"),
            Self::ApplicationClone => write!(f, "ApplicationClone"),
            Self::PostExecRule => write!(f, "PostExecRule"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Status of an ApplicationClone
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCloneStatus {
    /// Overall status
    #[serde(default)]
    pub status: CloneStatus,

    /// Current stage
    #[serde(default)]
    pub stage: CloneStage,
}

/// Specification for an ApplicationClone
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "lattice.dev",
    version = "v1alpha1",
    kind = "ApplicationClone",
    plural = "applicationclones",
    shortname = "aclone",
    namespaced,
    status = "ApplicationCloneStatus",
    printcolumn = r#"{"name":"Stage","type":"string","jsonPath":".status.stage"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCloneSpec {
    /// Source namespace to destination namespace
    #[serde(default)]
    pub namespace_mapping: BTreeMap<String, String>,

    /// Label selector applied to collected resources (all pairs must match)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selectors: BTreeMap<String, String>,

    /// Rule run before cloning starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_exec_rule: Option<String>,

    /// Rule run after cloning finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_exec_rule: Option<String>,
}

impl ApplicationCloneSpec {
    /// Source namespaces in sorted order
    pub fn source_namespaces(&self) -> Vec<String> {
        self.namespace_mapping.keys().cloned().collect()
    }
}
