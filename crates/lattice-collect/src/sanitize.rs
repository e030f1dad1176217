//! Prepare collected objects for re-creation elsewhere
//!
//! Removes everything the origin cluster assigned: `status`, all metadata
//! except name/namespace/labels/annotations, and kind-specific bindings
//! (a volume's claim and storage class, a service's cluster IP).

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CollectError;
use crate::object::ResourceObject;
use crate::{PERSISTENT_VOLUME, SERVICE};

/// Metadata fields that survive sanitization
pub const KEPT_METADATA_FIELDS: &[&str] = &["name", "namespace", "labels", "annotations"];

/// Cluster IP value marking a headless service
pub const HEADLESS_CLUSTER_IP: &str = "None";

type Rewrite = fn(&mut Map<String, Value>) -> Result<(), String>;

/// Kind-specific rewrites applied to an object's `spec`
const SPEC_REWRITES: &[(&str, Rewrite)] = &[
    (PERSISTENT_VOLUME, unbind_volume),
    (SERVICE, release_cluster_ip),
];

/// Sanitize every object in place
pub fn prepare_resources(objects: &mut [ResourceObject]) -> Result<(), CollectError> {
    for object in objects.iter_mut() {
        prepare_resource(object)?;
    }
    debug!(count = objects.len(), "Prepared resources");
    Ok(())
}

/// Sanitize one object in place
pub fn prepare_resource(object: &mut ResourceObject) -> Result<(), CollectError> {
    let identity = object.display();
    let rewrite = SPEC_REWRITES
        .iter()
        .find(|(kind, _)| *kind == object.kind())
        .map(|(_, rewrite)| *rewrite);

    let Some(root) = object.value_mut().as_object_mut() else {
        return Err(CollectError::cast(identity, "object is not a map"));
    };

    root.remove("status");

    let metadata = root
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CollectError::cast(&identity, "metadata is missing or not a map"))?;
    metadata.retain(|key, _| KEPT_METADATA_FIELDS.contains(&key.as_str()));

    if let Some(rewrite) = rewrite {
        let spec = root
            .get_mut("spec")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CollectError::cast(&identity, "spec is missing or not a map"))?;
        rewrite(spec).map_err(|message| CollectError::cast(&identity, message))?;
    }

    Ok(())
}

/// Let the destination bind the volume to any matching claim and class
fn unbind_volume(spec: &mut Map<String, Value>) -> Result<(), String> {
    spec.remove("claimRef");
    spec.remove("storageClassName");
    Ok(())
}

/// Drop the assigned cluster IP unless the service is headless
fn release_cluster_ip(spec: &mut Map<String, Value>) -> Result<(), String> {
    let headless = match spec.get("clusterIP") {
        None | Some(Value::Null) => false,
        Some(Value::String(ip)) => ip == HEADLESS_CLUSTER_IP,
        Some(_) => return Err("spec.clusterIP is not a string".to_string()),
    };
    if !headless {
        spec.remove("clusterIP");
        spec.remove("clusterIPs");
    }
    Ok(())
}
