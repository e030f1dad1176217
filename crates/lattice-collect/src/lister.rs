//! Generic object listing

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams};
use kube::{Client, ResourceExt};
use serde_json::Value;
use tracing::debug;

use crate::discovery::KindDescriptor;
use crate::error::CollectError;
use crate::object::ResourceObject;
use crate::selector::LabelSelector;

/// Lists objects of a kind as generic `ResourceObject`s
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// List `kind` in `namespace` (or cluster-wide for `None`), filtered by `selector`
    async fn list(
        &self,
        kind: &KindDescriptor,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ResourceObject>, CollectError>;
}

/// Lister backed by dynamic `Api<DynamicObject>` calls
pub struct KubeLister {
    client: Client,
}

impl KubeLister {
    /// Create a lister using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectLister for KubeLister {
    async fn list(
        &self,
        kind: &KindDescriptor,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ResourceObject>, CollectError> {
        let ar = kind.api_resource();
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_query());
        }

        let list = api.list(&params).await.map_err(|e| CollectError::List {
            kind: kind.kind.clone(),
            namespace: namespace.map(str::to_string),
            message: e.to_string(),
        })?;

        debug!(
            kind = %kind.kind,
            api_version = %ar.api_version,
            namespace = namespace.unwrap_or(""),
            count = list.items.len(),
            "Listed objects"
        );

        list.items
            .into_iter()
            .map(|obj| to_resource_object(obj, kind))
            .collect()
    }
}

/// Convert a listed object, restoring the `apiVersion`/`kind` list items omit
fn to_resource_object(
    obj: DynamicObject,
    kind: &KindDescriptor,
) -> Result<ResourceObject, CollectError> {
    let mut value = serde_json::to_value(&obj).map_err(|e| {
        CollectError::cast(format!("{} {}", kind.kind, obj.name_any()), e.to_string())
    })?;

    if let Some(map) = value.as_object_mut() {
        map.insert("apiVersion".to_string(), Value::String(kind.api_version()));
        map.insert("kind".to_string(), Value::String(kind.kind.clone()));
    }

    ResourceObject::from_value(value)
}
