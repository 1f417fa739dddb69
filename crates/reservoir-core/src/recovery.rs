//! Permanent-failure bookkeeping.
//!
//! A permanently failed task must be replaced on a new agent instead of
//! restarted in place. The marker lives in the task's labels and is only
//! ever toggled by re-persisting the full record, never by deleting it.

use tracing::info;

use reservoir_model::{PodInstance, TaskRecord};

use crate::labels::{TaskLabelReader, TaskLabelWriter};
use crate::state::StateStore;

pub fn is_failed(task: &TaskRecord) -> bool {
    TaskLabelReader::new(task).is_permanently_failed()
}

/// Whether the whole pod instance needs replacement: it has persisted tasks
/// and every one of them is marked. A pod with no records is not failed.
pub fn is_pod_failed(instance: &PodInstance, store: &dyn StateStore) -> bool {
    let records = pod_records(instance, store);
    !records.is_empty() && records.iter().all(is_failed)
}

/// Mark every persisted task of the pod instance as permanently failed.
pub fn mark_failed(instance: &PodInstance, store: &dyn StateStore) {
    let updated: Vec<TaskRecord> = pod_records(instance, store)
        .into_iter()
        .map(|mut task| {
            task.labels = TaskLabelWriter::from_task(&task)
                .set_permanently_failed()
                .build();
            task
        })
        .collect();
    if !updated.is_empty() {
        info!(pod = %instance.name(), tasks = updated.len(), "marked pod permanently failed");
        store.store_tasks(&updated);
    }
}

/// Remove the permanent-failure marker from every persisted task of the pod
/// instance, e.g. once replacement has gone through.
pub fn clear_failed(instance: &PodInstance, store: &dyn StateStore) {
    let updated: Vec<TaskRecord> = pod_records(instance, store)
        .into_iter()
        .map(|mut task| {
            task.labels = TaskLabelWriter::from_task(&task)
                .clear_permanently_failed()
                .build();
            task
        })
        .collect();
    if !updated.is_empty() {
        info!(pod = %instance.name(), tasks = updated.len(), "cleared pod failure markers");
        store.store_tasks(&updated);
    }
}

fn pod_records(instance: &PodInstance, store: &dyn StateStore) -> Vec<TaskRecord> {
    instance
        .pod
        .tasks
        .iter()
        .filter_map(|task| store.fetch_task(&instance.task_instance_name(task)))
        .collect()
}
