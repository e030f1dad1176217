//! Common types for Lattice resource collection: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for Lattice custom resources
pub const LATTICE_API_GROUP: &str = "lattice.dev";
