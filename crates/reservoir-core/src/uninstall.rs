//! Teardown bookkeeping.
//!
//! When a service is being uninstalled, every reservation handed back to the
//! cluster is recorded by rewriting its ID to a tombstone on the persisted
//! task records. The rewrite survives restarts, so a resurfacing offer for
//! an already-released reservation is recognized and not re-claimed.

use std::sync::Arc;

use tracing::{info, warn};

use reservoir_model::{Resource, TaskRecord};

use crate::labels::resource::{set_resource_id, tombstoned};
use crate::labels::ResourceLabelReader;
use crate::state::StateStore;

/// Notified whenever a reservation release has been durably recorded.
pub trait UninstallListener: Send + Sync {
    fn resource_released(&self, resource: &Resource);
}

/// Records reservation releases against the persisted task records.
pub struct UninstallRecorder {
    store: Arc<dyn StateStore>,
    listeners: Vec<Arc<dyn UninstallListener>>,
}

impl UninstallRecorder {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn UninstallListener>) {
        self.listeners.push(listener);
    }

    /// Record that `resource`'s reservation has been released.
    ///
    /// Every persisted task holding a resource with the exact same
    /// reservation ID gets that ID rewritten to its tombstone form and is
    /// re-persisted; listeners fire once the rewrite is stored. ID-less
    /// resources and IDs no persisted task holds are logged no-ops.
    pub fn record(&self, resource: &Resource) {
        let Some(id) = ResourceLabelReader::new(resource).resource_id() else {
            warn!(resource = %resource.name, "released resource carries no reservation id");
            return;
        };

        let mut updated: Vec<TaskRecord> = Vec::new();
        for mut task in self.store.fetch_tasks() {
            let mut changed = false;
            task.resources = task
                .resources
                .iter()
                .map(|held| {
                    if ResourceLabelReader::new(held).resource_id() == Some(id) {
                        changed = true;
                        set_resource_id(held, &tombstoned(id))
                    } else {
                        held.clone()
                    }
                })
                .collect();
            if changed {
                updated.push(task);
            }
        }

        if updated.is_empty() {
            info!(resource_id = %id, "no persisted task holds the released reservation");
            return;
        }

        info!(resource_id = %id, tasks = updated.len(), "recorded reservation release");
        self.store.store_tasks(&updated);
        for listener in &self.listeners {
            listener.resource_released(resource);
        }
    }
}
