//! Error types for resource collection

use thiserror::Error;

/// Errors from resource collection and sanitization
///
/// Every collaborator failure is fatal to the enclosing collection call; the
/// caller decides whether to retry the whole call.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A collaborator could not be constructed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// API discovery refresh failed
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Listing a kind failed
    #[error("failed to list {kind} in {}: {message}", scope(.namespace))]
    List {
        /// Kind being listed
        kind: String,
        /// Namespace listed, `None` for a cluster-wide list
        namespace: Option<String>,
        /// Error message
        message: String,
    },

    /// A typed lookup failed for a reason other than absence
    #[error("failed to get {kind} {}: {message}", object_ref(.namespace, .name))]
    Lookup {
        /// Kind being fetched
        kind: String,
        /// Namespace of the object, `None` when cluster-scoped
        namespace: Option<String>,
        /// Object name
        name: String,
        /// Error message
        message: String,
    },

    /// A referenced object does not exist
    #[error("{kind} {} not found", object_ref(.namespace, .name))]
    NotFound {
        /// Kind that was looked up
        kind: String,
        /// Namespace of the object, `None` when cluster-scoped
        namespace: Option<String>,
        /// Object name
        name: String,
    },

    /// An object did not have the expected shape
    #[error("malformed object {object}: {message}")]
    Cast {
        /// Identity of the object (kind/namespace/name, as far as known)
        object: String,
        /// What was missing or mistyped
        message: String,
    },

    /// The ownership oracle failed to answer
    #[error("ownership check failed for claim {namespace}/{name}: {message}")]
    Ownership {
        /// Claim namespace
        namespace: String,
        /// Claim name
        name: String,
        /// Error message
        message: String,
    },
}

impl CollectError {
    /// Create a not-found error for a namespaced object
    pub fn not_found(kind: impl Into<String>, namespace: &str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: Some(namespace.to_string()),
            name: name.into(),
        }
    }

    /// Create a not-found error for a cluster-scoped object
    pub fn cluster_not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: None,
            name: name.into(),
        }
    }

    /// Create a cast error for an object
    pub fn cast(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cast {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Check if retrying the whole collection call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollectError::Discovery(_)
                | CollectError::List { .. }
                | CollectError::Lookup { .. }
                | CollectError::Ownership { .. }
        )
    }
}

fn scope(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!("namespace {}", ns),
        None => "cluster scope".to_string(),
    }
}

fn object_ref(namespace: &Option<String>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}
