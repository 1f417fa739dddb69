//! Codec for the opaque identity metadata the scheduler embeds in the
//! resource manager's own data model.
//!
//! Three namespaces are kept deliberately separate: task labels and
//! resource-reservation labels are scheduler-internal bookkeeping, while
//! task environment variables are visible to the running process.

pub mod env;
pub mod resource;
pub mod task;

pub use resource::{ResourceLabelReader, is_tombstoned, strip_tombstone, tombstoned};
pub use task::{TaskLabelReader, TaskLabelWriter, readiness_check_or_none};

use crate::error::MissingFieldError;
use reservoir_model::KeyValueMap;

/// Label and marker keys.
///
/// `PORT_LABEL_PREFIX` is a reserved namespace: any reservation-label key
/// starting with it is interpreted as a port assignment, so arbitrary label
/// keys must stay out of that prefix.
pub mod keys {
    pub const RESOURCE_ID: &str = "resource_id";
    pub const TASK_TYPE: &str = "task_type";
    pub const TASK_INDEX: &str = "index";
    pub const GOAL_STATE: &str = "goal_state";
    pub const TRANSIENT: &str = "transient";
    pub const PERMANENTLY_FAILED: &str = "permanently_failed";
    pub const TARGET_CONFIGURATION: &str = "target_configuration";
    pub const READINESS_CHECK: &str = "readiness_check";
    pub const READINESS_CHECK_PASSED: &str = "readiness_check_passed";
    pub const OFFER_HOSTNAME: &str = "offer_hostname";
    pub const OFFER_ATTRIBUTES: &str = "offer_attributes";

    pub const PORT_LABEL_PREFIX: &str = "port_";
    /// Prefix rewritten onto a resource ID to mark logical release.
    pub const TOMBSTONE_MARKER: &str = "uninstalled_";

    pub const BOOLEAN_TRUE: &str = "true";
}

/// Fetch a required key from a label/env map, failing with the source
/// object's name, the key, and the currently present keys.
pub(crate) fn get_required<'a>(
    source_name: &str,
    kind: &'static str,
    map: &'a KeyValueMap,
    key: &str,
) -> Result<&'a str, MissingFieldError> {
    map.get(key).ok_or_else(|| MissingFieldError {
        source_name: source_name.to_string(),
        kind,
        key: key.to_string(),
        available: map.keys(),
    })
}
