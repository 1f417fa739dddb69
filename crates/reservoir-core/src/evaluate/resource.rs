use tracing::info;
use uuid::Uuid;

use reservoir_model::{Resource, TaskRecord, Value};

use crate::error::InsufficientResourceError;
use crate::evaluate::EvaluationOutcome;
use crate::labels::resource::set_resource_id;
use crate::pool::ResourcePool;
use crate::requirement::ResourceRequirement;

/// Match one plain resource demand against the pool.
///
/// A demand carrying a reservation ID refreshes that reservation, growing it
/// from the unreserved pool when the spec quantity increased. A demand
/// without one consumes unreserved capacity and mints a fresh ID.
pub(crate) fn evaluate(
    requirement: &ResourceRequirement,
    pool: &mut ResourcePool,
    mut draft: TaskRecord,
) -> (TaskRecord, EvaluationOutcome) {
    let source = format!("Resource[{}]", requirement.name());
    match fulfill(requirement, pool) {
        Ok((resource, reason)) => {
            draft.resources.push(resource);
            (draft, EvaluationOutcome::pass(&source, reason))
        }
        Err(err) => (draft, EvaluationOutcome::fail(&source, err.to_string())),
    }
}

fn fulfill(
    requirement: &ResourceRequirement,
    pool: &mut ResourcePool,
) -> Result<(Resource, String), InsufficientResourceError> {
    let name = requirement.name();
    let desired = requirement.value();

    let Some(id) = requirement.resource_id() else {
        pool.consume_unreserved(name, desired)?;
        let id = Uuid::new_v4().to_string();
        info!(resource = name, resource_id = %id, "minted new reservation");
        return Ok((
            set_resource_id(&requirement.resource, &id),
            format!("new reservation '{id}'"),
        ));
    };

    let reserved = pool
        .reserved(id)
        .map(|r| r.value.clone())
        .ok_or_else(|| InsufficientResourceError::new(name, desired.clone(), None))?;

    if reserved.fits(desired) {
        let consumed = pool.consume_reserved(name, desired, id)?;
        return Ok((consumed, format!("reused reservation '{id}'")));
    }

    // The spec quantity grew: take the whole existing reservation and cover
    // the difference from unreserved capacity.
    let delta = match (desired, &reserved) {
        (Value::Scalar(want), Value::Scalar(have)) => Value::Scalar(want - have),
        _ => desired.subtract(&reserved).map_err(|_| {
            InsufficientResourceError::new(name, desired.clone(), Some(reserved.clone()))
        })?,
    };
    // Both draws must be possible before either is applied, so a shortfall
    // on the delta cannot leave the reservation spent.
    let delta_covered = pool
        .available_unreserved(name)
        .is_some_and(|available| available.fits(&delta));
    if !delta_covered {
        return Err(InsufficientResourceError::new(
            name,
            desired.clone(),
            pool.available_unreserved(name).cloned(),
        ));
    }
    pool.consume_reserved(name, &reserved, id)?;
    pool.consume_unreserved(name, &delta)?;
    info!(resource = name, resource_id = %id, "grew existing reservation");
    Ok((
        requirement.resource.clone(),
        format!("grew reservation '{id}'"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ResourceLabelReader;
    use crate::testing;

    fn requirement(value: Value) -> ResourceRequirement {
        ResourceRequirement::plain(Resource::desired("cpus", value, "role", "principal"))
    }

    #[test]
    fn fresh_demand_mints_a_reservation() {
        let mut pool = testing::pool_with(vec![Resource::unreserved("cpus", Value::Scalar(2.0))]);
        let (draft, outcome) =
            evaluate(&requirement(Value::Scalar(1.5)), &mut pool, TaskRecord::default());

        assert!(outcome.passed());
        let fulfilled = &draft.resources[0];
        assert!(ResourceLabelReader::new(fulfilled).resource_id().is_some());
        assert_eq!(fulfilled.value, Value::Scalar(1.5));
        assert_eq!(fulfilled.role, "role");
    }

    #[test]
    fn insufficient_capacity_fails_without_mutating_draft() {
        let mut pool = testing::pool_with(vec![Resource::unreserved("cpus", Value::Scalar(1.0))]);
        let (draft, outcome) =
            evaluate(&requirement(Value::Scalar(1.5)), &mut pool, TaskRecord::default());

        assert!(!outcome.passed());
        assert!(draft.resources.is_empty());
    }

    #[test]
    fn identified_demand_reuses_the_reservation() {
        let reserved = set_resource_id(
            &Resource::desired("cpus", Value::Scalar(1.0), "role", "principal"),
            "id-1",
        );
        let mut pool = testing::pool_with(vec![reserved.clone()]);

        let demand = ResourceRequirement::plain(reserved);
        let (draft, outcome) = evaluate(&demand, &mut pool, TaskRecord::default());

        assert!(outcome.passed());
        assert_eq!(outcome.reason(), "reused reservation 'id-1'");
        assert_eq!(
            ResourceLabelReader::new(&draft.resources[0]).resource_id(),
            Some("id-1")
        );
    }

    #[test]
    fn grown_demand_draws_the_difference_from_unreserved() {
        let reserved = set_resource_id(
            &Resource::desired("cpus", Value::Scalar(1.0), "role", "principal"),
            "id-1",
        );
        let mut pool = testing::pool_with(vec![
            reserved.clone(),
            Resource::unreserved("cpus", Value::Scalar(1.0)),
        ]);

        let demand = ResourceRequirement::plain(reserved.with_value(Value::Scalar(2.0)));
        let (draft, outcome) = evaluate(&demand, &mut pool, TaskRecord::default());

        assert!(outcome.passed());
        assert_eq!(draft.resources[0].value, Value::Scalar(2.0));
        // Both the reservation and the unreserved pool are now spent.
        assert!(pool.consume_unreserved("cpus", &Value::Scalar(0.1)).is_err());
    }

    #[test]
    fn grown_demand_fails_when_unreserved_cannot_cover_the_difference() {
        let reserved = set_resource_id(
            &Resource::desired("cpus", Value::Scalar(1.0), "role", "principal"),
            "id-1",
        );
        let mut pool = testing::pool_with(vec![reserved.clone()]);

        let demand = ResourceRequirement::plain(reserved.with_value(Value::Scalar(2.0)));
        let (_, outcome) = evaluate(&demand, &mut pool, TaskRecord::default());
        assert!(!outcome.passed());
        // The existing reservation stays claimable by a sibling demand.
        assert!(pool
            .consume_reserved("cpus", &Value::Scalar(1.0), "id-1")
            .is_ok());
    }

    #[test]
    fn identified_demand_missing_from_offer_fails() {
        let mut pool = testing::pool_with(vec![]);
        let demand = ResourceRequirement::plain(set_resource_id(
            &Resource::desired("cpus", Value::Scalar(1.0), "role", "principal"),
            "id-404",
        ));
        let (_, outcome) = evaluate(&demand, &mut pool, TaskRecord::default());
        assert!(!outcome.passed());
    }
}
