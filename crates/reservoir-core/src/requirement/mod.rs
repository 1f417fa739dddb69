//! Requirement trees: the declarative "what this pod instance needs" handed
//! to the evaluation pipeline.

mod provider;
pub use provider::RequirementProvider;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use reservoir_model::{ExecutorRecord, PortSpec, Resource, TaskRecord, Value, VolumeType};

use crate::evaluate::PlacementRule;
use crate::labels::ResourceLabelReader;

/// How a single resource demand is matched against an offer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// A plain scalar or ranged quantity.
    Plain,
    /// The task's single coalesced ports resource, backed by the named port
    /// specs that feed it.
    Ports(Vec<PortSpec>),
    /// A persistent volume of the given source type.
    Volume(VolumeType),
}

/// One resource demand of a task or executor.
///
/// The embedded resource is the desired shape: role, principal and value come
/// from the spec, while reservation labels carry forward any identity from a
/// previous launch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequirement {
    pub resource: Resource,
    pub kind: ResourceKind,
}

impl ResourceRequirement {
    pub fn plain(resource: Resource) -> Self {
        Self {
            resource,
            kind: ResourceKind::Plain,
        }
    }

    pub fn ports(resource: Resource, specs: Vec<PortSpec>) -> Self {
        Self {
            resource,
            kind: ResourceKind::Ports(specs),
        }
    }

    pub fn volume(resource: Resource, volume_type: VolumeType) -> Self {
        Self {
            resource,
            kind: ResourceKind::Volume(volume_type),
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    pub fn value(&self) -> &Value {
        &self.resource.value
    }

    /// Reservation ID carried over from a previous launch, if any.
    pub fn resource_id(&self) -> Option<&str> {
        ResourceLabelReader::new(&self.resource).resource_id()
    }
}

/// One task's demands: a draft record (labels, command env, health check
/// already assembled) plus the resources it must be matched with.
#[derive(Debug, Clone)]
pub struct TaskRequirement {
    pub draft: TaskRecord,
    pub resources: Vec<ResourceRequirement>,
}

impl TaskRequirement {
    pub fn name(&self) -> &str {
        &self.draft.name
    }
}

/// The pod-level executor's demands.
#[derive(Debug, Clone)]
pub struct ExecutorRequirement {
    pub draft: ExecutorRecord,
    /// Pod-wide volumes held by the executor rather than any one task.
    pub volumes: Vec<ResourceRequirement>,
}

impl ExecutorRequirement {
    /// Whether this reuses an already-running executor instead of launching
    /// a new one.
    pub fn is_existing(&self) -> bool {
        self.draft.is_existing()
    }
}

/// Everything one pod instance asks of a single offer.
#[derive(Clone)]
pub struct RequirementTree {
    pub pod_type: String,
    pub index: u32,
    pub tasks: Vec<TaskRequirement>,
    pub executor: ExecutorRequirement,
    /// Agent-selection predicate; only set for fresh launches, since moving
    /// an already-placed pod is never re-litigated here.
    pub placement: Option<Arc<dyn PlacementRule>>,
}

impl RequirementTree {
    /// `<type>-<index>`, the pod instance this tree belongs to.
    pub fn name(&self) -> String {
        format!("{}-{}", self.pod_type, self.index)
    }

    /// Every port number already spoken for by this tree: fixed port specs
    /// plus assignments recorded on carried-over resources. Dynamic port
    /// selection must avoid all of them.
    pub fn claimed_ports(&self) -> BTreeSet<u64> {
        let mut claimed = BTreeSet::new();
        for requirement in self.all_resources() {
            if let ResourceKind::Ports(specs) = &requirement.kind {
                claimed.extend(specs.iter().filter(|s| !s.is_dynamic()).map(|s| s.port));
            }
            for (_, port) in ResourceLabelReader::new(&requirement.resource).ports() {
                claimed.insert(port);
            }
        }
        claimed
    }

    fn all_resources(&self) -> impl Iterator<Item = &ResourceRequirement> {
        self.tasks
            .iter()
            .flat_map(|t| t.resources.iter())
            .chain(self.executor.volumes.iter())
    }
}

impl fmt::Debug for RequirementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequirementTree")
            .field("pod_type", &self.pod_type)
            .field("index", &self.index)
            .field("tasks", &self.tasks)
            .field("executor", &self.executor)
            .field("placement", &self.placement.is_some())
            .finish()
    }
}
