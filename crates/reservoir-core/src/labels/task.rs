use tracing::warn;
use uuid::Uuid;

use reservoir_model::{CheckSpec, GoalState, KeyValueMap, Offer, TaskRecord, TaskStatus};

use crate::error::{DecodeError, MissingFieldError};
use crate::labels::{get_required, keys};

/// Read access to the task labels written by the scheduler.
pub struct TaskLabelReader<'a> {
    source_name: &'a str,
    labels: &'a KeyValueMap,
}

impl<'a> TaskLabelReader<'a> {
    pub fn new(task: &'a TaskRecord) -> Self {
        Self {
            source_name: &task.name,
            labels: &task.labels,
        }
    }

    fn required(&self, key: &str) -> Result<&'a str, MissingFieldError> {
        get_required(self.source_name, "label", self.labels, key)
    }

    /// The pod type the task belongs to.
    pub fn task_type(&self) -> Result<&'a str, MissingFieldError> {
        self.required(keys::TASK_TYPE)
    }

    /// The pod instance index of the task.
    pub fn index(&self) -> Result<u32, DecodeError> {
        let raw = self
            .required(keys::TASK_INDEX)
            .map_err(|e| DecodeError {
                key: keys::TASK_INDEX.to_string(),
                reason: e.to_string(),
            })?;
        raw.parse().map_err(|_| DecodeError {
            key: keys::TASK_INDEX.to_string(),
            reason: format!("not an integer: '{raw}'"),
        })
    }

    /// The target-configuration ID the task was last built against.
    pub fn target_configuration(&self) -> Result<Uuid, DecodeError> {
        let raw = self
            .required(keys::TARGET_CONFIGURATION)
            .map_err(|e| DecodeError {
                key: keys::TARGET_CONFIGURATION.to_string(),
                reason: e.to_string(),
            })?;
        Uuid::parse_str(raw).map_err(|_| DecodeError {
            key: keys::TARGET_CONFIGURATION.to_string(),
            reason: format!("not a UUID: '{raw}'"),
        })
    }

    pub fn goal_state(&self) -> Result<&'a str, MissingFieldError> {
        self.required(keys::GOAL_STATE)
    }

    /// Hostname of the agent the task was launched on.
    pub fn hostname(&self) -> Result<&'a str, MissingFieldError> {
        self.required(keys::OFFER_HOSTNAME)
    }

    /// Whether the task only exists to hold reserved resources and must
    /// never be launched.
    pub fn is_transient(&self) -> bool {
        self.labels.get(keys::TRANSIENT) == Some(keys::BOOLEAN_TRUE)
    }

    /// Whether the task needs replacement on a new agent rather than a
    /// restart in place.
    pub fn is_permanently_failed(&self) -> bool {
        self.labels.get(keys::PERMANENTLY_FAILED) == Some(keys::BOOLEAN_TRUE)
    }

    /// The embedded readiness check, if one is configured.
    ///
    /// A malformed payload is an error for the caller to log loudly; callers
    /// then proceed as if the check were absent rather than wedging the
    /// pod's scheduling.
    pub fn readiness_check(&self) -> Result<Option<CheckSpec>, DecodeError> {
        match self.labels.get(keys::READINESS_CHECK) {
            None => Ok(None),
            Some(encoded) => serde_json::from_str(encoded)
                .map(Some)
                .map_err(|e| DecodeError::new(keys::READINESS_CHECK, e)),
        }
    }

    /// Whether the task's readiness check has succeeded, according to a
    /// status update. Tasks without a readiness check pass trivially; a
    /// check without a recorded pass has not succeeded yet.
    pub fn readiness_check_succeeded(&self, status: &TaskStatus) -> bool {
        if !self.labels.contains_key(keys::READINESS_CHECK) {
            return true;
        }
        status.labels.get(keys::READINESS_CHECK_PASSED) == Some(keys::BOOLEAN_TRUE)
    }
}

/// Write access to the task labels written by the scheduler.
///
/// Accumulates changes against a copy of the task's labels; nothing is
/// applied until [`TaskLabelWriter::build`].
pub struct TaskLabelWriter {
    labels: KeyValueMap,
}

impl TaskLabelWriter {
    pub fn new() -> Self {
        Self {
            labels: KeyValueMap::new(),
        }
    }

    pub fn from_task(task: &TaskRecord) -> Self {
        Self {
            labels: task.labels.clone(),
        }
    }

    pub fn set_type(mut self, pod_type: &str) -> Self {
        self.labels.put(keys::TASK_TYPE, pod_type);
        self
    }

    pub fn set_index(mut self, index: u32) -> Self {
        self.labels.put(keys::TASK_INDEX, index.to_string());
        self
    }

    pub fn set_goal_state(mut self, goal: GoalState) -> Self {
        self.labels.put(keys::GOAL_STATE, goal.as_str());
        self
    }

    pub fn set_target_configuration(mut self, id: Uuid) -> Self {
        self.labels.put(keys::TARGET_CONFIGURATION, id.to_string());
        self
    }

    pub fn set_transient(mut self) -> Self {
        self.labels.put(keys::TRANSIENT, keys::BOOLEAN_TRUE);
        self
    }

    pub fn clear_transient(mut self) -> Self {
        self.labels.remove(keys::TRANSIENT);
        self
    }

    pub fn set_permanently_failed(mut self) -> Self {
        self.labels.put(keys::PERMANENTLY_FAILED, keys::BOOLEAN_TRUE);
        self
    }

    pub fn clear_permanently_failed(mut self) -> Self {
        self.labels.remove(keys::PERMANENTLY_FAILED);
        self
    }

    /// Record the agent hostname and attributes of the offer the task was
    /// launched against.
    pub fn set_offer(mut self, offer: &Offer) -> Self {
        self.labels.put(keys::OFFER_HOSTNAME, &offer.hostname);
        let joined = offer
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(";");
        self.labels.put(keys::OFFER_ATTRIBUTES, joined);
        self
    }

    /// Store the readiness check as a single self-contained encoded label.
    pub fn set_readiness_check(mut self, check: &CheckSpec) -> Result<Self, DecodeError> {
        let encoded = serde_json::to_string(check)
            .map_err(|e| DecodeError::new(keys::READINESS_CHECK, e))?;
        self.labels.put(keys::READINESS_CHECK, encoded);
        Ok(self)
    }

    pub fn build(self) -> KeyValueMap {
        self.labels
    }
}

impl Default for TaskLabelWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a task's readiness check, treating a malformed payload as absent.
///
/// The decode failure is logged loudly rather than propagated so one
/// corrupted label cannot wedge an entire pod's scheduling.
pub fn readiness_check_or_none(task: &TaskRecord) -> Option<CheckSpec> {
    match TaskLabelReader::new(task).readiness_check() {
        Ok(check) => check,
        Err(err) => {
            warn!(task = %task.name, error = %err, "discarding malformed readiness check label");
            None
        }
    }
}
