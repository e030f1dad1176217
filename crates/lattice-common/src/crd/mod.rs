//! Custom Resource Definitions for Lattice resource collection
//!
//! These are the workflow-facing records that sit beside the collector: where
//! a backup is written and which namespaces a clone copies.

mod application_clone;
mod backup_location;

pub use application_clone::{
    ApplicationClone, ApplicationCloneSpec, ApplicationCloneStatus, CloneStage, CloneStatus,
};
pub use backup_location::{
    AzureConfig, BackupLocation, BackupLocationSpec, BackupLocationType, GoogleConfig, S3Config,
    DEFAULT_S3_ENDPOINT, DEFAULT_S3_REGION,
};
