use serde::{Deserialize, Serialize};

use crate::{KeyValueMap, PodSpec, TaskSpec};

/// One numbered instantiation of a pod template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInstance {
    pub pod: PodSpec,
    /// Zero-based index within the pod's declared count.
    pub index: u32,
}

impl PodInstance {
    pub fn new(pod: PodSpec, index: u32) -> Self {
        Self { pod, index }
    }

    /// `<type>-<index>`, e.g. `broker-2`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.pod.pod_type, self.index)
    }

    /// `<type>-<index>-<task>`, the key a task's records persist under.
    pub fn task_instance_name(&self, task: &TaskSpec) -> String {
        format!("{}-{}", self.name(), task.name)
    }

    /// Whether two instances refer to the same slot of the same pod type.
    pub fn is_same_instance(&self, other: &PodInstance) -> bool {
        self.pod.pod_type == other.pod.pod_type && self.index == other.index
    }
}

/// How a pending pod instance should be recovered, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryType {
    #[default]
    None,
    /// Replace on a new agent; prior reservations are abandoned.
    Permanent,
    /// Restart in place against the existing reservations.
    Transient,
}

/// A pending unit of work: a pod instance and the subset of its tasks the
/// caller wants launched this round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInstanceRequirement {
    pub pod_instance: PodInstance,
    pub tasks_to_launch: Vec<String>,
    /// Extra environment entries layered over each task's declared env.
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub parameters: KeyValueMap,
    #[serde(default)]
    pub recovery_type: RecoveryType,
}

impl PodInstanceRequirement {
    pub fn new(pod_instance: PodInstance, tasks_to_launch: Vec<String>) -> Self {
        Self {
            pod_instance,
            tasks_to_launch,
            parameters: KeyValueMap::new(),
            recovery_type: RecoveryType::None,
        }
    }

    pub fn with_parameters(mut self, parameters: KeyValueMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_recovery_type(mut self, recovery_type: RecoveryType) -> Self {
        self.recovery_type = recovery_type;
        self
    }

    pub fn name(&self) -> String {
        format!(
            "{}:[{}]",
            self.pod_instance.name(),
            self.tasks_to_launch.join(", ")
        )
    }

    /// Two requirements conflict iff they address the same pod instance and
    /// the same task subset; the surrounding scheduler uses this to
    /// serialize concurrent work on a pod.
    pub fn conflicts_with(&self, other: &PodInstanceRequirement) -> bool {
        let same_instance = self.pod_instance.is_same_instance(&other.pod_instance);
        let mut mine: Vec<&String> = self.tasks_to_launch.iter().collect();
        let mut theirs: Vec<&String> = other.tasks_to_launch.iter().collect();
        mine.sort();
        theirs.sort();
        same_instance && mine == theirs
    }
}
