//! Errors raised by the shared client, telemetry and CRD helpers
//!
//! Each variant names the resource, secret or call site it concerns so a
//! failed credential lookup or client setup can be traced back to its input.

use thiserror::Error;

/// Error type for `lattice-common`
#[derive(Debug, Error)]
pub enum Error {
    /// API server or transport failure
    #[error("kubernetes error: {source}")]
    Kube {
        /// kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A custom resource is missing something it needs
    #[error("invalid {resource} at {field}: {message}")]
    Validation {
        /// Resource display name
        resource: String,
        /// Field path, e.g. `metadata.namespace`
        field: String,
        /// What is wrong
        message: String,
    },

    /// A credentials secret could not be read
    #[error("secret {namespace}/{secret}: {message}")]
    SecretConfig {
        /// Namespace the secret was looked up in
        namespace: String,
        /// Secret name
        secret: String,
        /// What is wrong
        message: String,
    },

    /// Client or subscriber setup failed
    #[error("{call} failed: {message}")]
    Setup {
        /// The setup step, e.g. `create_client`
        call: String,
        /// Underlying failure
        message: String,
    },
}

impl Error {
    /// Invalid field on a named resource
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Unreadable or incomplete credentials secret
    pub fn secret_config(
        namespace: impl Into<String>,
        secret: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SecretConfig {
            namespace: namespace.into(),
            secret: secret.into(),
            message: message.into(),
        }
    }

    /// Failure in a named setup step
    pub fn setup(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            call: call.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call can succeed.
    ///
    /// Client-side API errors (4xx) and invalid resources are final. A missing
    /// secret may be created later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::SecretConfig { .. } | Error::Setup { .. } => true,
        }
    }
}
