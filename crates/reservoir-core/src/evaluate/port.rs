use std::collections::BTreeSet;

use uuid::Uuid;

use reservoir_model::{
    Offer, PORTS_RESOURCE_NAME, PortSpec, Range, Resource, TaskRecord, Value, merge_ranges,
};

use crate::evaluate::EvaluationOutcome;
use crate::labels::ResourceLabelReader;
use crate::labels::env::{legacy_port_from_env, set_port_env};
use crate::labels::resource::{set_port, set_resource_id};
use crate::pool::ResourcePool;
use crate::requirement::ResourceRequirement;

/// Match a task's named ports against the pool.
///
/// Fixed ports are taken as declared. Dynamic ports stick to whatever was
/// assigned on a previous launch (reservation label first, exported envvar as
/// the legacy fallback) and otherwise take the lowest offered port nobody
/// else has claimed. Every assignment lands in the task's single `ports`
/// resource and is exported to the process and probe environments.
pub(crate) fn evaluate(
    requirement: &ResourceRequirement,
    specs: &[PortSpec],
    offer: &Offer,
    pool: &mut ResourcePool,
    claimed: &mut BTreeSet<u64>,
    draft: TaskRecord,
) -> (TaskRecord, EvaluationOutcome) {
    let mut work = draft.clone();
    // Consumption lands on a scratch copy; the real pool only changes once
    // every named port has matched.
    let mut scratch = pool.clone();
    let mut newly_claimed: BTreeSet<u64> = BTreeSet::new();
    let mut children = Vec::new();

    // Ports of one task share a single reservation identity.
    let shared_id = requirement
        .resource_id()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    for spec in specs {
        let source = format!("Port[{}]", spec.name);

        let port = if !spec.is_dynamic() {
            spec.port
        } else {
            let prior = ResourceLabelReader::new(&requirement.resource)
                .port(&spec.name)
                .or_else(|| legacy_port_from_env(&work, &spec.name, spec.env_key.as_deref()));
            match prior.or_else(|| select_dynamic(&scratch, claimed, &newly_claimed)) {
                Some(port) => port,
                None => {
                    children.push(EvaluationOutcome::fail(
                        &source,
                        format!("no assignable ports remain in offer '{}'", offer.id),
                    ));
                    return (draft, parent(&work.name, children));
                }
            }
        };

        let desired = Value::Ranges(vec![Range::single(port)]);
        let consumed = match requirement.resource_id() {
            Some(id) if scratch.reserved(id).is_some_and(|r| r.value.fits(&desired)) => {
                scratch.consume_reserved(PORTS_RESOURCE_NAME, &desired, id)
            }
            _ => scratch.consume_unreserved(PORTS_RESOURCE_NAME, &desired),
        };
        if let Err(err) = consumed {
            children.push(EvaluationOutcome::fail(
                &source,
                format!("port {port} not available in offer '{}': {err}", offer.id),
            ));
            return (draft, parent(&work.name, children));
        }

        upsert_ports_resource(&mut work, requirement, &shared_id, &spec.name, port);
        if let Err(err) = set_port_env(&mut work, &spec.name, spec.env_key.as_deref(), port) {
            children.push(EvaluationOutcome::fail(&source, err.to_string()));
            return (draft, parent(&work.name, children));
        }

        newly_claimed.insert(port);
        children.push(EvaluationOutcome::pass(&source, format!("assigned port {port}")));
    }

    *pool = scratch;
    claimed.extend(newly_claimed);
    (work, parent(&draft.name, children))
}

fn parent(task_name: &str, children: Vec<EvaluationOutcome>) -> EvaluationOutcome {
    EvaluationOutcome::pass(&format!("Ports[{task_name}]"), "named ports").with_children(children)
}

/// Lowest offered unreserved port not claimed by the requirement tree or by
/// an earlier assignment this round.
fn select_dynamic(
    pool: &ResourcePool,
    claimed: &BTreeSet<u64>,
    newly_claimed: &BTreeSet<u64>,
) -> Option<u64> {
    pool.available_unreserved(PORTS_RESOURCE_NAME)?
        .flattened()
        .into_iter()
        .find(|p| !claimed.contains(p) && !newly_claimed.contains(p))
}

fn upsert_ports_resource(
    work: &mut TaskRecord,
    requirement: &ResourceRequirement,
    shared_id: &str,
    port_name: &str,
    port: u64,
) {
    match work
        .resources
        .iter_mut()
        .find(|r| r.name == PORTS_RESOURCE_NAME)
    {
        Some(existing) => {
            let merged = merge_ranges(
                existing.value.as_ranges().unwrap_or(&[]),
                &[Range::single(port)],
            );
            existing.value = Value::Ranges(merged);
            *existing = set_port(existing, port_name, port);
        }
        None => {
            let principal = requirement
                .resource
                .reservation
                .as_ref()
                .map(|r| r.principal.clone())
                .unwrap_or_default();
            let base = Resource::desired(
                PORTS_RESOURCE_NAME,
                Value::Ranges(vec![Range::single(port)]),
                &requirement.resource.role,
                principal,
            );
            let labeled = set_port(&set_resource_id(&base, shared_id), port_name, port);
            work.resources.push(labeled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use reservoir_model::CommandRecord;

    fn spec(name: &str, port: u64) -> PortSpec {
        PortSpec {
            name: name.to_string(),
            port,
            env_key: None,
        }
    }

    fn ports_requirement(fixed: &[u64]) -> ResourceRequirement {
        let ranges: Vec<Range> = fixed.iter().map(|p| Range::single(*p)).collect();
        ResourceRequirement::ports(
            Resource::desired(
                PORTS_RESOURCE_NAME,
                Value::Ranges(ranges),
                "role",
                "principal",
            ),
            Vec::new(),
        )
    }

    fn run(
        requirement: &ResourceRequirement,
        specs: &[PortSpec],
        pool: &mut ResourcePool,
        claimed: &mut BTreeSet<u64>,
        draft: TaskRecord,
    ) -> (TaskRecord, EvaluationOutcome) {
        evaluate(requirement, specs, &testing::empty_offer(), pool, claimed, draft)
    }

    #[test]
    fn fixed_port_is_consumed_and_exported() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(8000, 9000)]);
        let (draft, outcome) = run(
            &ports_requirement(&[8080]),
            &[spec("api", 8080)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(outcome.passed());
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        assert_eq!(ports.value, Value::Ranges(vec![Range::single(8080)]));
        assert_eq!(ResourceLabelReader::new(ports).port("api"), Some(8080));
        assert_eq!(draft.environment().get("PORT_API"), Some("8080"));
    }

    #[test]
    fn dynamic_port_takes_lowest_unclaimed() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31010)]);
        let mut claimed: BTreeSet<u64> = [31000, 31001].into_iter().collect();
        let (draft, outcome) = run(
            &ports_requirement(&[]),
            &[spec("http", 0)],
            &mut pool,
            &mut claimed,
            TaskRecord::default(),
        );

        assert!(outcome.passed());
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        assert_eq!(ResourceLabelReader::new(ports).port("http"), Some(31002));
        assert!(claimed.contains(&31002));
    }

    #[test]
    fn prior_label_keeps_dynamic_port_sticky() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31010)]);
        let requirement = ResourceRequirement::ports(
            set_port(&ports_requirement(&[]).resource, "http", 31005),
            Vec::new(),
        );
        let (draft, outcome) = run(
            &requirement,
            &[spec("http", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(outcome.passed());
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        assert_eq!(ResourceLabelReader::new(ports).port("http"), Some(31005));
    }

    #[test]
    fn legacy_env_export_keeps_dynamic_port_sticky() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31010)]);
        let draft = TaskRecord {
            command: Some(CommandRecord {
                value: "./server".to_string(),
                environment: [("PORT_HTTP", "31007")].into_iter().collect(),
            }),
            ..Default::default()
        };
        let (draft, outcome) = run(
            &ports_requirement(&[]),
            &[spec("http", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            draft,
        );

        assert!(outcome.passed());
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        assert_eq!(ResourceLabelReader::new(ports).port("http"), Some(31007));
    }

    #[test]
    fn sticky_port_missing_from_offer_fails_and_leaves_draft_untouched() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31004)]);
        let requirement = ResourceRequirement::ports(
            set_port(&ports_requirement(&[]).resource, "http", 31005),
            Vec::new(),
        );
        let (draft, outcome) = run(
            &requirement,
            &[spec("http", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(!outcome.passed());
        assert!(draft.resources.is_empty());
        assert!(draft.environment().get("PORT_HTTP").is_none());
    }

    #[test]
    fn failed_stage_leaves_pool_untouched() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31000)]);
        let (_, outcome) = run(
            &ports_requirement(&[]),
            &[spec("http", 0), spec("admin", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(!outcome.passed());
        // The port taken for "http" came back with the failure.
        assert_eq!(
            pool.available_unreserved(PORTS_RESOURCE_NAME),
            Some(&Value::Ranges(vec![Range::single(31000)]))
        );
    }

    #[test]
    fn exhausted_offer_fails_naming_the_offer() {
        let mut pool = testing::pool_with(vec![]);
        let (_, outcome) = run(
            &ports_requirement(&[]),
            &[spec("http", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );
        assert!(!outcome.passed());
        assert!(outcome.children()[0].reason().contains("offer"));
    }

    #[test]
    fn two_ports_share_one_resource_and_identity() {
        let mut pool = testing::pool_with(vec![testing::offered_ports(31000, 31010)]);
        let (draft, outcome) = run(
            &ports_requirement(&[]),
            &[spec("http", 0), spec("admin", 0)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(outcome.passed());
        assert_eq!(
            draft
                .resources
                .iter()
                .filter(|r| r.name == PORTS_RESOURCE_NAME)
                .count(),
            1
        );
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        let reader = ResourceLabelReader::new(ports);
        assert_eq!(reader.port("http"), Some(31000));
        assert_eq!(reader.port("admin"), Some(31001));
        assert!(reader.resource_id().is_some());
        assert_eq!(
            ports.value,
            Value::Ranges(vec![Range::new(31000, 31001)])
        );
        assert_eq!(draft.environment().get("PORT_HTTP"), Some("31000"));
        assert_eq!(draft.environment().get("PORT_ADMIN"), Some("31001"));
    }

    #[test]
    fn reserved_ports_are_drawn_from_the_reservation() {
        let reserved = set_resource_id(
            &Resource::desired(
                PORTS_RESOURCE_NAME,
                Value::Ranges(vec![Range::single(8080)]),
                "role",
                "principal",
            ),
            "id-ports",
        );
        let mut pool = testing::pool_with(vec![reserved.clone()]);
        let requirement = ResourceRequirement::ports(reserved, Vec::new());

        let (draft, outcome) = run(
            &requirement,
            &[spec("api", 8080)],
            &mut pool,
            &mut BTreeSet::new(),
            TaskRecord::default(),
        );

        assert!(outcome.passed());
        let ports = draft.resource(PORTS_RESOURCE_NAME).unwrap();
        assert_eq!(ResourceLabelReader::new(ports).resource_id(), Some("id-ports"));
    }
}
