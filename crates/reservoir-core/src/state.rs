//! Persistence seam between the engine and the surrounding scheduler.
//!
//! The engine only ever reads and re-persists whole records; storage layout
//! and durability are the embedder's concern.

use std::collections::BTreeMap;
use std::sync::RwLock;

use uuid::Uuid;

use reservoir_model::{TaskRecord, TaskStatus};

/// Access to the persisted task records and their latest status updates.
///
/// Task records are keyed by their instance-qualified name, e.g.
/// `broker-2-server`.
pub trait StateStore: Send + Sync {
    fn fetch_task(&self, name: &str) -> Option<TaskRecord>;
    fn fetch_status(&self, name: &str) -> Option<TaskStatus>;
    /// Every persisted task record.
    fn fetch_tasks(&self) -> Vec<TaskRecord>;
    /// Persist records, overwriting by name.
    fn store_tasks(&self, tasks: &[TaskRecord]);
    fn store_status(&self, status: &TaskStatus);
}

/// In-memory [`StateStore`] for tests and embedders that keep their own
/// durable copy.
#[derive(Default)]
pub struct MemoryStateStore {
    tasks: RwLock<BTreeMap<String, TaskRecord>>,
    statuses: RwLock<BTreeMap<String, TaskStatus>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn fetch_task(&self, name: &str) -> Option<TaskRecord> {
        self.tasks.read().expect("state lock").get(name).cloned()
    }

    fn fetch_status(&self, name: &str) -> Option<TaskStatus> {
        self.statuses.read().expect("state lock").get(name).cloned()
    }

    fn fetch_tasks(&self) -> Vec<TaskRecord> {
        self.tasks.read().expect("state lock").values().cloned().collect()
    }

    fn store_tasks(&self, tasks: &[TaskRecord]) {
        let mut held = self.tasks.write().expect("state lock");
        for task in tasks {
            held.insert(task.name.clone(), task.clone());
        }
    }

    fn store_status(&self, status: &TaskStatus) {
        self.statuses
            .write()
            .expect("state lock")
            .insert(status.task_name.clone(), status.clone());
    }
}

/// Builds the URLs tasks fetch their config-file templates from.
///
/// The target configuration ID is part of the path, so a task always fetches
/// the templates of the configuration it was built against.
#[derive(Debug, Clone)]
pub struct ArtifactUrls {
    base_url: String,
}

impl ArtifactUrls {
    /// `base_url` without a trailing slash, e.g. `http://scheduler.svc:8080`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn template_url(
        &self,
        service_name: &str,
        target_configuration: Uuid,
        pod_type: &str,
        task_name: &str,
        config_name: &str,
    ) -> String {
        format!(
            "{}/{}/artifacts/template/{}/{}/{}/{}",
            self.base_url, service_name, target_configuration, pod_type, task_name, config_name
        )
    }
}
