use tracing::info;
use uuid::Uuid;

use reservoir_model::{DISK_RESOURCE_NAME, Resource, TaskRecord, VolumeType};

use crate::error::InsufficientResourceError;
use crate::evaluate::EvaluationOutcome;
use crate::labels::resource::set_resource_id;
use crate::pool::ResourcePool;
use crate::requirement::{ResourceKind, ResourceRequirement};

/// Match one persistent volume demand against the pool.
pub(crate) fn evaluate(
    requirement: &ResourceRequirement,
    pool: &mut ResourcePool,
    mut draft: TaskRecord,
) -> (TaskRecord, EvaluationOutcome) {
    let (resource, outcome) = fulfill(requirement, pool);
    if let Some(resource) = resource {
        draft.resources.push(resource);
    }
    (draft, outcome)
}

/// Core volume matching, shared by the task and executor stages.
///
/// Existing volumes are reclaimed by reservation ID and carried verbatim,
/// never resized. Fresh root volumes carve their exact size out of the
/// offered root disk; fresh mount volumes take a whole offered mount
/// (adopting its actual root and size) since mounts cannot be split.
pub(crate) fn fulfill(
    requirement: &ResourceRequirement,
    pool: &mut ResourcePool,
) -> (Option<Resource>, EvaluationOutcome) {
    let path = requirement.resource.container_path().unwrap_or("<none>");
    let source = format!("Volume[{path}]");

    match try_fulfill(requirement, pool) {
        Ok((resource, reason)) => {
            let outcome = EvaluationOutcome::pass(&source, reason);
            (Some(resource), outcome)
        }
        Err(err) => (None, EvaluationOutcome::fail(&source, err.to_string())),
    }
}

fn try_fulfill(
    requirement: &ResourceRequirement,
    pool: &mut ResourcePool,
) -> Result<(Resource, String), InsufficientResourceError> {
    let desired = requirement.value();

    if let Some(id) = requirement.resource_id() {
        pool.consume_reserved(DISK_RESOURCE_NAME, desired, id)?;
        return Ok((
            requirement.resource.clone(),
            format!("reused volume reservation '{id}'"),
        ));
    }

    let volume_type = match &requirement.kind {
        ResourceKind::Volume(vt) => *vt,
        // Non-volume requirements never reach this stage.
        _ => VolumeType::Root,
    };
    match volume_type {
        VolumeType::Root => {
            pool.consume_unreserved(DISK_RESOURCE_NAME, desired)?;
            let (resource, resource_id, persistence_id) = mint(&requirement.resource);
            info!(
                container_path = %resource.container_path().unwrap_or_default(),
                resource_id = %resource_id,
                "created root volume"
            );
            Ok((resource, format!("new root volume '{persistence_id}'")))
        }
        VolumeType::Mount => {
            let consumed = pool.consume_unreserved_atomic(DISK_RESOURCE_NAME, desired)?;
            // The whole mount is taken: actual size and mount root come from
            // the offer, everything else from the demand.
            let mut adopted = requirement.resource.with_value(consumed.value.clone());
            if let (Some(ours), Some(theirs)) = (adopted.disk.as_mut(), consumed.disk.as_ref()) {
                ours.source = theirs.source.clone();
            }
            let (resource, resource_id, persistence_id) = mint(&adopted);
            info!(
                container_path = %resource.container_path().unwrap_or_default(),
                resource_id = %resource_id,
                "created mount volume"
            );
            Ok((resource, format!("new mount volume '{persistence_id}'")))
        }
    }
}

/// Attach fresh reservation and persistence identities to a new volume.
fn mint(resource: &Resource) -> (Resource, String, String) {
    let resource_id = Uuid::new_v4().to_string();
    let persistence_id = Uuid::new_v4().to_string();
    let mut out = set_resource_id(resource, &resource_id);
    if let Some(disk) = out.disk.as_mut() {
        disk.persistence_id = persistence_id.clone();
    }
    (out, resource_id, persistence_id)
}
