//! Generic resource object
//!
//! A `ResourceObject` is a listed object kept as raw JSON, with its identity
//! (kind, apiVersion, namespace, name, uid) lifted out at construction. Field
//! accessors take dotted paths (`spec.claimRef.name`) and fail with
//! `CollectError::Cast` when a value has the wrong type. The `get_*` forms
//! also fail when the path is absent; the `find_*` forms return `None`.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CollectError;

/// A listed object in generic form
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObject {
    kind: String,
    api_version: String,
    namespace: Option<String>,
    name: String,
    uid: String,
    value: Value,
}

impl ResourceObject {
    /// Wrap a JSON object, requiring `kind`, `apiVersion`, `metadata.name` and `metadata.uid`
    pub fn from_value(value: Value) -> Result<Self, CollectError> {
        if !value.is_object() {
            return Err(CollectError::cast("<unknown>", "object is not a JSON map"));
        }

        let identity = |path: &str| -> Result<String, CollectError> {
            lookup_str(&value, path)
                .map_err(|message| CollectError::cast(partial_identity(&value), message))?
                .map(str::to_string)
                .ok_or_else(|| {
                    CollectError::cast(partial_identity(&value), format!("missing {}", path))
                })
        };

        let kind = identity("kind")?;
        let api_version = identity("apiVersion")?;
        let name = identity("metadata.name")?;
        let uid = identity("metadata.uid")?;
        let namespace = lookup_str(&value, "metadata.namespace")
            .map_err(|message| CollectError::cast(partial_identity(&value), message))?
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(Self {
            kind,
            api_version,
            namespace,
            name,
            uid,
            value,
        })
    }

    /// Object kind (e.g., "PersistentVolume")
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// API version (e.g., "apps/v1")
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Namespace, `None` for cluster-scoped objects
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cluster-unique id; the deduplication key
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Human-readable identity for logs and errors
    pub fn display(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{} {}/{}", self.kind, ns, self.name),
            None => format!("{} {}", self.kind, self.name),
        }
    }

    /// Object labels; empty when unset
    pub fn labels(&self) -> Result<BTreeMap<String, String>, CollectError> {
        self.string_map("metadata.labels")
    }

    /// Object annotations; empty when unset
    pub fn annotations(&self) -> Result<BTreeMap<String, String>, CollectError> {
        self.string_map("metadata.annotations")
    }

    /// Raw value at `path`, if present
    pub fn find(&self, path: &str) -> Option<&Value> {
        walk(&self.value, path)
    }

    /// String at `path`; fails if absent or not a string
    pub fn get_str(&self, path: &str) -> Result<&str, CollectError> {
        self.find_str(path)?.ok_or_else(|| self.missing(path))
    }

    /// String at `path`, or `None` if absent; fails if not a string
    pub fn find_str(&self, path: &str) -> Result<Option<&str>, CollectError> {
        lookup_str(&self.value, path).map_err(|message| CollectError::cast(self.display(), message))
    }

    /// Map at `path`; fails if absent or not a map
    pub fn get_map(&self, path: &str) -> Result<&Map<String, Value>, CollectError> {
        self.find_map(path)?.ok_or_else(|| self.missing(path))
    }

    /// Map at `path`, or `None` if absent; fails if not a map
    pub fn find_map(&self, path: &str) -> Result<Option<&Map<String, Value>>, CollectError> {
        match self.find(path) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(self.mistyped(path, "map", other)),
        }
    }

    /// Boolean at `path`; fails if absent or not a boolean
    pub fn get_bool(&self, path: &str) -> Result<bool, CollectError> {
        match self.find(path) {
            None | Some(Value::Null) => Err(self.missing(path)),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.mistyped(path, "bool", other)),
        }
    }

    /// The underlying JSON
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the object, returning its JSON
    pub fn into_value(self) -> Value {
        self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    fn string_map(&self, path: &str) -> Result<BTreeMap<String, String>, CollectError> {
        let Some(map) = self.find_map(path)? else {
            return Ok(BTreeMap::new());
        };
        map.iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                other => Err(self.mistyped(&format!("{}.{}", path, k), "string", other)),
            })
            .collect()
    }

    fn missing(&self, path: &str) -> CollectError {
        CollectError::cast(self.display(), format!("missing {}", path))
    }

    fn mistyped(&self, path: &str, expected: &str, found: &Value) -> CollectError {
        CollectError::cast(
            self.display(),
            format!("{} is not a {} (found {})", path, expected, type_name(found)),
        )
    }
}

impl Serialize for ResourceObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

fn lookup_str<'a>(value: &'a Value, path: &str) -> Result<Option<&'a str>, String> {
    match walk(value, path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(format!(
            "{} is not a string (found {})",
            path,
            type_name(other)
        )),
    }
}

fn partial_identity(value: &Value) -> String {
    let part = |path: &str| walk(value, path).and_then(Value::as_str).unwrap_or("?");
    format!("{} {}", part("kind"), part("metadata.name"))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn volume() -> ResourceObject {
        ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "PersistentVolume",
            "metadata": {
                "name": "pv-data",
                "uid": "uid-pv-1",
                "labels": {"tier": "gold"}
            },
            "spec": {
                "claimRef": {"name": "data-pvc", "namespace": "ns1"},
                "capacity": {"storage": "10Gi"},
                "mountOptions": ["hard"],
                "csi": {"readOnly": false}
            },
            "status": {"phase": "Bound"}
        }))
        .expect("valid object")
    }

    #[test]
    fn test_identity_is_lifted() {
        let obj = volume();
        assert_eq!(obj.kind(), "PersistentVolume");
        assert_eq!(obj.api_version(), "v1");
        assert_eq!(obj.name(), "pv-data");
        assert_eq!(obj.uid(), "uid-pv-1");
        assert_eq!(obj.namespace(), None);
        assert_eq!(obj.display(), "PersistentVolume pv-data");
    }

    #[test]
    fn test_path_accessors() {
        let obj = volume();
        assert_eq!(obj.get_str("spec.claimRef.name").unwrap(), "data-pvc");
        assert_eq!(obj.find_str("status.phase").unwrap(), Some("Bound"));
        assert_eq!(obj.find_str("spec.storageClassName").unwrap(), None);
        assert!(obj.get_map("spec.capacity").unwrap().contains_key("storage"));
        assert!(!obj.get_bool("spec.csi.readOnly").unwrap());
        assert_eq!(obj.labels().unwrap().get("tier").map(String::as_str), Some("gold"));
        assert!(obj.annotations().unwrap().is_empty());
    }

    #[test]
    fn test_accessors_fail_explicitly() {
        let obj = volume();

        let err = obj.get_str("spec.storageClassName").unwrap_err();
        assert!(err.to_string().contains("missing spec.storageClassName"));

        let err = obj.find_str("spec.capacity").unwrap_err();
        assert!(err.to_string().contains("spec.capacity is not a string (found map)"));

        let err = obj.find_map("spec.mountOptions").unwrap_err();
        assert!(matches!(err, CollectError::Cast { .. }));

        let err = obj.get_bool("spec.claimRef.name").unwrap_err();
        assert!(err.to_string().contains("is not a bool"));
    }

    #[test]
    fn test_from_value_requires_identity() {
        let err = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings", "namespace": "ns1"}
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed object ConfigMap settings: missing metadata.uid"
        );

        let err = ResourceObject::from_value(json!(["not", "a", "map"])).unwrap_err();
        assert!(matches!(err, CollectError::Cast { .. }));

        let err = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings", "uid": 42}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("metadata.uid is not a string"));
    }

    #[test]
    fn test_mistyped_label_value_is_cast_error() {
        let obj = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": "creds",
                "namespace": "ns1",
                "uid": "uid-s",
                "labels": {"replicas": 3}
            }
        }))
        .expect("valid object");

        assert_eq!(obj.namespace(), Some("ns1"));
        let err = obj.labels().unwrap_err();
        assert!(err.to_string().contains("metadata.labels.replicas is not a string"));
    }

    #[test]
    fn test_serializes_as_raw_json() {
        let obj = volume();
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value, *obj.value());
    }
}
