use serde::{Deserialize, Serialize};

use crate::{CheckSpec, KeyValueMap, Resource};

/// A resource manager's announcement of currently available resources on
/// one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub agent_id: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub attributes: KeyValueMap,
    pub resources: Vec<Resource>,
}

/// Command and environment a launched task runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub value: String,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub environment: KeyValueMap,
}

/// Container settings for an executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

/// The launch descriptor for a pod's executor, shared by all of its tasks.
///
/// An empty `executor_id` marks a freshly generated executor that has not
/// been launched yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorRecord {
    pub name: String,
    #[serde(default)]
    pub executor_id: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerRecord>,
    /// Runtime dependencies and config-file templates fetched before start.
    #[serde(default)]
    pub uris: Vec<String>,
}

impl ExecutorRecord {
    pub fn is_existing(&self) -> bool {
        !self.executor_id.is_empty()
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// The launch descriptor for one task, as persisted and as handed to the
/// resource manager.
///
/// `task_id` and `agent_id` stay empty on drafts until the surrounding
/// scheduler actually launches the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub name: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub labels: KeyValueMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorRecord>,
}

impl TaskRecord {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Task env, empty if no command is attached.
    pub fn environment(&self) -> KeyValueMap {
        self.command
            .as_ref()
            .map(|c| c.environment.clone())
            .unwrap_or_default()
    }
}

/// Lifecycle state reported for a launched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

/// A status update for a launched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub task_name: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub labels: KeyValueMap,
}

impl TaskStatus {
    pub fn new(task_name: &str, state: TaskState) -> Self {
        Self {
            task_name: task_name.to_string(),
            state,
            labels: KeyValueMap::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn task_record_serde_roundtrip() {
        let record = TaskRecord {
            name: "pod-0-server".to_string(),
            task_id: String::new(),
            agent_id: String::new(),
            resources: vec![Resource::desired("cpus", Value::Scalar(1.0), "role", "principal")],
            labels: [("task_type", "pod")].into_iter().collect(),
            command: Some(CommandRecord {
                value: "./server".to_string(),
                environment: [("FOO", "bar")].into_iter().collect(),
            }),
            health_check: None,
            executor: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: TaskRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn draft_executor_is_not_existing() {
        let mut executor = ExecutorRecord {
            name: "pod-0".to_string(),
            ..Default::default()
        };
        assert!(!executor.is_existing());
        executor.executor_id = "executor-uuid".to_string();
        assert!(executor.is_existing());
    }

    #[test]
    fn resource_lookup_by_name() {
        let record = TaskRecord {
            name: "t".to_string(),
            resources: vec![
                Resource::unreserved("cpus", Value::Scalar(1.0)),
                Resource::unreserved("mem", Value::Scalar(256.0)),
            ],
            ..Default::default()
        };
        assert_eq!(record.resource("mem").unwrap().name, "mem");
        assert!(record.resource("disk").is_none());
    }

    #[test]
    fn running_state_is_distinguished() {
        assert!(TaskStatus::new("t", TaskState::Running).is_running());
        assert!(!TaskStatus::new("t", TaskState::Staging).is_running());
    }
}
