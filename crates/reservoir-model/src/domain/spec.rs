use serde::{Deserialize, Serialize};

use crate::{KeyValueMap, PORTS_RESOURCE_NAME, Range, Resource, Value};

/// Terminal goal of a task: stay up forever, or run to completion once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalState {
    Running,
    Finished,
}

impl GoalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalState::Running => "RUNNING",
            GoalState::Finished => "FINISHED",
        }
    }
}

/// A readiness or health check to run against a task.
///
/// Stored against the task as a single encoded label, since label maps are
/// flat while checks are nested structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub env: KeyValueMap,
    pub delay_secs: u32,
    pub interval_secs: u32,
    pub timeout_secs: u32,
}

/// Shell command a task runs, with its developer-provided environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub value: String,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub environment: KeyValueMap,
}

/// A config-file template rendered on the agent before task start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFileSpec {
    pub name: String,
    pub relative_path: String,
}

/// A single named port. A zero `port` requests dynamic assignment at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub name: String,
    pub port: u64,
    /// Override for the environment variable the port is advertised under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
}

impl PortSpec {
    pub fn is_dynamic(&self) -> bool {
        self.port == 0
    }
}

/// A scalar or ranged resource demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub name: String,
    pub value: Value,
    pub role: String,
    pub principal: String,
}

impl ResourceSpec {
    /// The not-yet-matched resource this spec asks for.
    pub fn to_desired_resource(&self) -> Resource {
        Resource::desired(&self.name, self.value.clone(), &self.role, &self.principal)
    }
}

/// Source kind for a persistent volume demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeType {
    Root,
    Mount,
}

/// A persistent volume demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub container_path: String,
    pub size_mb: f64,
    pub volume_type: VolumeType,
    pub role: String,
    pub principal: String,
}

impl VolumeSpec {
    /// The not-yet-created volume resource this spec asks for.
    pub fn to_desired_resource(&self) -> Resource {
        match self.volume_type {
            VolumeType::Root => Resource::desired_root_volume(
                &self.role,
                &self.principal,
                self.size_mb,
                &self.container_path,
            ),
            VolumeType::Mount => Resource::desired_mount_volume(
                &self.role,
                &self.principal,
                self.size_mb,
                &self.container_path,
            ),
        }
    }
}

/// A named bundle of resource demands, shareable between tasks that must be
/// co-scheduled against the same concrete resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSet {
    pub id: String,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

impl ResourceSet {
    /// Role/principal for port resources, taken from the first declared
    /// resource spec.
    pub fn role_and_principal(&self) -> Option<(&str, &str)> {
        self.resources
            .first()
            .map(|r| (r.role.as_str(), r.principal.as_str()))
    }

    /// Single ranges-typed `ports` resource covering every fixed port in the
    /// set. Dynamic ports (value 0) contribute nothing until assigned.
    ///
    /// The wire format allows only one resource entry per name per task, so
    /// individually-specified ports coalesce here; the union is rebuilt on
    /// every call and never persisted separately.
    pub fn coalesced_ports(&self) -> Option<Resource> {
        if self.ports.is_empty() {
            return None;
        }
        let ranges: Vec<Range> = self
            .ports
            .iter()
            .filter(|p| !p.is_dynamic())
            .map(|p| Range::single(p.port))
            .fold(Vec::new(), |acc, r| crate::merge_ranges(&acc, &[r]));
        let (role, principal) = self.role_and_principal().unwrap_or(("*", ""));
        Some(Resource::desired(
            PORTS_RESOURCE_NAME,
            Value::Ranges(ranges),
            role,
            principal,
        ))
    }
}

/// One task of a pod template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub name: String,
    pub goal: GoalState,
    pub resource_set: ResourceSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub config_files: Vec<ConfigFileSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check: Option<CheckSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckSpec>,
}

/// A multi-task pod template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(rename = "type")]
    pub pod_type: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    /// URIs for runtime dependencies fetched before any task starts.
    #[serde(default)]
    pub uris: Vec<String>,
    /// Volumes shared by the whole pod, held by its executor.
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    pub tasks: Vec<TaskSpec>,
}

impl PodSpec {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }
}
