use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use reservoir_model::{
    CommandRecord, ContainerRecord, ExecutorRecord, KeyValueMap, PORTS_RESOURCE_NAME, PodInstance,
    PodInstanceRequirement, RecoveryType, TaskRecord, TaskSpec,
};

use crate::error::InvalidRequirementError;
use crate::evaluate::PlacementRule;
use crate::labels::env::{
    CONFIG_TEMPLATE_PREFIX, FRAMEWORK_NAME, POD_INSTANCE_INDEX, TASK_NAME, to_env_name,
};
use crate::labels::{TaskLabelReader, TaskLabelWriter, keys};
use crate::requirement::{
    ExecutorRequirement, RequirementTree, ResourceRequirement, TaskRequirement,
};
use crate::state::{ArtifactUrls, StateStore};

/// Turns a pending pod instance into the requirement tree the evaluation
/// pipeline matches against offers.
///
/// Two construction paths exist. The fresh path builds everything from the
/// spec and asks for brand-new reservations. The existing path starts from
/// the persisted task records so reservation and volume identities survive
/// restarts and config updates.
pub struct RequirementProvider {
    store: Arc<dyn StateStore>,
    service_name: String,
    target_configuration: Uuid,
    artifact_urls: ArtifactUrls,
}

impl RequirementProvider {
    pub fn new(
        store: Arc<dyn StateStore>,
        service_name: &str,
        target_configuration: Uuid,
        artifact_urls: ArtifactUrls,
    ) -> Self {
        Self {
            store,
            service_name: service_name.to_string(),
            target_configuration,
            artifact_urls,
        }
    }

    /// Pick the construction path for a pending pod instance: fresh when the
    /// pod was never launched or must be replaced outright, existing
    /// otherwise.
    pub fn requirement(
        &self,
        requirement: &PodInstanceRequirement,
        placement: Option<Arc<dyn PlacementRule>>,
    ) -> Result<RequirementTree, InvalidRequirementError> {
        let has_record = requirement.tasks_to_launch.iter().any(|task_name| {
            self.persisted_record(&requirement.pod_instance, task_name)
                .is_some()
        });
        if requirement.recovery_type == RecoveryType::Permanent || !has_record {
            self.fresh_requirement(requirement, placement)
        } else {
            self.existing_requirement(requirement)
        }
    }

    /// Build a requirement tree asking for brand-new reservations.
    ///
    /// Each launched task gets a launchable requirement; each resource set
    /// not covered by a launched task gets one transient requirement so the
    /// whole pod footprint is reserved up front.
    pub fn fresh_requirement(
        &self,
        requirement: &PodInstanceRequirement,
        placement: Option<Arc<dyn PlacementRule>>,
    ) -> Result<RequirementTree, InvalidRequirementError> {
        let instance = &requirement.pod_instance;
        let pod = &instance.pod;

        let mut tasks = Vec::new();
        let mut used_sets: Vec<&str> = Vec::new();
        for task_spec in &pod.tasks {
            if !requirement.tasks_to_launch.contains(&task_spec.name) {
                continue;
            }
            let set_id = task_spec.resource_set.id.as_str();
            // Tasks sharing a resource set run against the same concrete
            // resources; the first one demands them for all.
            if used_sets.contains(&set_id) {
                continue;
            }
            used_sets.push(set_id);
            tasks.push(TaskRequirement {
                draft: self.task_draft(instance, task_spec, &requirement.parameters, false)?,
                resources: spec_resources(task_spec),
            });
        }

        if tasks.is_empty() {
            return Err(InvalidRequirementError::Empty);
        }

        for task_spec in &pod.tasks {
            if requirement.tasks_to_launch.contains(&task_spec.name) {
                continue;
            }
            let set_id = task_spec.resource_set.id.as_str();
            if used_sets.contains(&set_id) {
                continue;
            }
            used_sets.push(set_id);
            tasks.push(TaskRequirement {
                draft: self.task_draft(instance, task_spec, &requirement.parameters, true)?,
                resources: spec_resources(task_spec),
            });
        }

        info!(
            pod = %instance.name(),
            tasks = tasks.len(),
            "built fresh requirement"
        );
        Ok(RequirementTree {
            pod_type: pod.pod_type.clone(),
            index: instance.index,
            tasks,
            executor: self.executor_requirement(instance),
            placement,
        })
    }

    /// Build a requirement tree that reclaims the reservations recorded on
    /// the pod's persisted tasks.
    ///
    /// Already-placed pods never re-run placement, so no rule is attached.
    pub fn existing_requirement(
        &self,
        requirement: &PodInstanceRequirement,
    ) -> Result<RequirementTree, InvalidRequirementError> {
        let instance = &requirement.pod_instance;
        let pod = &instance.pod;

        let mut tasks = Vec::new();
        for task_name in &requirement.tasks_to_launch {
            let Some(task_spec) = pod.task(task_name) else {
                warn!(pod = %instance.name(), task = %task_name, "unknown task name, skipping");
                continue;
            };

            let mut draft = self.task_draft(instance, task_spec, &requirement.parameters, false)?;
            let resources = match self.persisted_record(instance, task_name) {
                Some(record) => {
                    check_pod_type(&pod.pod_type, &record)?;
                    // New env entries win; stale keys survive so previously
                    // exported values stay visible to the process.
                    if let Some(command) = draft.command.as_mut() {
                        command.environment =
                            command.environment.merged_over(&record.environment());
                    }
                    carried_resources(task_spec, &record)
                }
                None => match self.sibling_record(instance, task_spec) {
                    Some(sibling) => {
                        info!(
                            pod = %instance.name(),
                            task = %task_name,
                            sibling = %sibling.name,
                            "recovering resources from resource-set sibling"
                        );
                        carried_resources(task_spec, &sibling)
                    }
                    None => {
                        warn!(
                            pod = %instance.name(),
                            task = %task_name,
                            "no persisted resources found, launching resource-less"
                        );
                        Vec::new()
                    }
                },
            };
            tasks.push(TaskRequirement { draft, resources });
        }

        if tasks.is_empty() {
            return Err(InvalidRequirementError::Empty);
        }

        info!(
            pod = %instance.name(),
            tasks = tasks.len(),
            "built existing requirement"
        );
        Ok(RequirementTree {
            pod_type: pod.pod_type.clone(),
            index: instance.index,
            tasks,
            executor: self.executor_requirement(instance),
            placement: None,
        })
    }

    fn persisted_record(&self, instance: &PodInstance, task_name: &str) -> Option<TaskRecord> {
        let task_spec = instance.pod.task(task_name)?;
        self.store
            .fetch_task(&instance.task_instance_name(task_spec))
    }

    /// A persisted record of another task in the same pod sharing the given
    /// task's resource set, used to recover reservations when the task itself
    /// was never written.
    fn sibling_record(&self, instance: &PodInstance, task_spec: &TaskSpec) -> Option<TaskRecord> {
        instance
            .pod
            .tasks
            .iter()
            .filter(|t| t.name != task_spec.name)
            .filter(|t| t.resource_set.id == task_spec.resource_set.id)
            .find_map(|t| self.store.fetch_task(&instance.task_instance_name(t)))
    }

    /// Assemble a draft task record: fresh labels, command environment and
    /// health check. Transient drafts carry labels only, since they exist to
    /// hold a footprint and are never handed over for launch.
    fn task_draft(
        &self,
        instance: &PodInstance,
        task_spec: &TaskSpec,
        parameters: &KeyValueMap,
        transient: bool,
    ) -> Result<TaskRecord, InvalidRequirementError> {
        let name = instance.task_instance_name(task_spec);

        let mut writer = TaskLabelWriter::new()
            .set_type(&instance.pod.pod_type)
            .set_index(instance.index)
            .set_goal_state(task_spec.goal)
            .set_target_configuration(self.target_configuration);
        if transient {
            writer = writer.set_transient();
        } else if let Some(check) = &task_spec.readiness_check {
            writer = writer.set_readiness_check(check)?;
        }

        let mut draft = TaskRecord {
            name: name.clone(),
            labels: writer.build(),
            ..Default::default()
        };
        if transient {
            return Ok(draft);
        }

        if let Some(command) = &task_spec.command {
            draft.command = Some(CommandRecord {
                value: command.value.clone(),
                environment: self.task_env(instance, task_spec, &name, parameters),
            });
        }
        draft.health_check = task_spec.health_check.clone();
        Ok(draft)
    }

    /// The environment a task's process starts with: declared env, the
    /// standard identity exports, config-template fetch URLs, and finally the
    /// caller's per-round parameter overrides.
    fn task_env(
        &self,
        instance: &PodInstance,
        task_spec: &TaskSpec,
        instance_task_name: &str,
        parameters: &KeyValueMap,
    ) -> KeyValueMap {
        let mut env = task_spec
            .command
            .as_ref()
            .map(|c| c.environment.clone())
            .unwrap_or_default();
        env.put(POD_INSTANCE_INDEX, instance.index.to_string());
        env.put(FRAMEWORK_NAME, &self.service_name);
        env.put(TASK_NAME, instance_task_name);
        // The task's own name doubles as a marker variable.
        env.put(instance_task_name, keys::BOOLEAN_TRUE);
        for config in &task_spec.config_files {
            env.put(
                format!("{CONFIG_TEMPLATE_PREFIX}{}", to_env_name(&config.name)),
                self.artifact_urls.template_url(
                    &self.service_name,
                    self.target_configuration,
                    &instance.pod.pod_type,
                    &task_spec.name,
                    &config.name,
                ),
            );
        }
        parameters.merged_over(&env)
    }

    /// Reuse the pod's executor while any of its tasks is running; otherwise
    /// draft a new one carrying the pod-wide container settings, fetch URIs
    /// and volumes.
    fn executor_requirement(&self, instance: &PodInstance) -> ExecutorRequirement {
        let pod = &instance.pod;
        for task_spec in &pod.tasks {
            let name = instance.task_instance_name(task_spec);
            let running = self
                .store
                .fetch_status(&name)
                .is_some_and(|s| s.is_running());
            if !running {
                continue;
            }
            if let Some(executor) = self.store.fetch_task(&name).and_then(|r| r.executor) {
                if executor.is_existing() {
                    return ExecutorRequirement {
                        draft: executor,
                        volumes: Vec::new(),
                    };
                }
            }
        }

        let mut uris = pod.uris.clone();
        for task_spec in &pod.tasks {
            for config in &task_spec.config_files {
                uris.push(self.artifact_urls.template_url(
                    &self.service_name,
                    self.target_configuration,
                    &pod.pod_type,
                    &task_spec.name,
                    &config.name,
                ));
            }
        }
        let container = if pod.image.is_some() || !pod.networks.is_empty() {
            Some(ContainerRecord {
                image: pod.image.clone(),
                networks: pod.networks.clone(),
            })
        } else {
            None
        };
        let volumes = pod
            .volumes
            .iter()
            .map(|v| ResourceRequirement::volume(v.to_desired_resource(), v.volume_type))
            .collect();

        ExecutorRequirement {
            draft: ExecutorRecord {
                name: instance.name(),
                executor_id: String::new(),
                resources: Vec::new(),
                command: None,
                container,
                uris,
            },
            volumes,
        }
    }
}

/// Fresh resource requirements straight from a task's resource set.
fn spec_resources(task_spec: &TaskSpec) -> Vec<ResourceRequirement> {
    let set = &task_spec.resource_set;
    let mut out: Vec<ResourceRequirement> = set
        .resources
        .iter()
        .map(|r| ResourceRequirement::plain(r.to_desired_resource()))
        .collect();
    if let Some(ports) = set.coalesced_ports() {
        out.push(ResourceRequirement::ports(ports, set.ports.clone()));
    }
    out.extend(
        set.volumes
            .iter()
            .map(|v| ResourceRequirement::volume(v.to_desired_resource(), v.volume_type)),
    );
    out
}

/// Resource requirements carried forward from a persisted record.
///
/// Non-disk quantities are re-shaped to the current spec while keeping their
/// reservation identity; disks are carried verbatim and never resized.
fn carried_resources(task_spec: &TaskSpec, record: &TaskRecord) -> Vec<ResourceRequirement> {
    let set = &task_spec.resource_set;
    let mut out = Vec::new();

    for spec in &set.resources {
        let requirement = match record.resource(&spec.name) {
            Some(old) if old.disk.is_none() && old.name != PORTS_RESOURCE_NAME => {
                if old.value.kind() == spec.value.kind() {
                    old.with_value(spec.value.clone())
                } else {
                    error!(
                        resource = %spec.name,
                        old = old.value.kind(),
                        new = spec.value.kind(),
                        "cannot change resource value kind, keeping previous resource"
                    );
                    old.clone()
                }
            }
            _ => spec.to_desired_resource(),
        };
        out.push(ResourceRequirement::plain(requirement));
    }

    if !set.ports.is_empty() {
        let base = record
            .resource(PORTS_RESOURCE_NAME)
            .cloned()
            .or_else(|| set.coalesced_ports());
        if let Some(base) = base {
            out.push(ResourceRequirement::ports(base, set.ports.clone()));
        }
    }

    for old in record.resources.iter().filter(|r| r.disk.is_some()) {
        let volume_type = if old.is_atomic() {
            reservoir_model::VolumeType::Mount
        } else {
            reservoir_model::VolumeType::Root
        };
        out.push(ResourceRequirement::volume(old.clone(), volume_type));
    }
    out
}

fn check_pod_type(expected: &str, record: &TaskRecord) -> Result<(), InvalidRequirementError> {
    match TaskLabelReader::new(record).task_type() {
        Ok(found) if found != expected => Err(InvalidRequirementError::MixedPodTypes {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}
