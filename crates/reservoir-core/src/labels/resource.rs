use tracing::warn;

use reservoir_model::{KeyValueMap, PORTS_RESOURCE_NAME, Resource};

use crate::labels::keys;

/// Read access to the reservation labels of a single resource.
pub struct ResourceLabelReader<'a> {
    resource: &'a Resource,
}

impl<'a> ResourceLabelReader<'a> {
    pub fn new(resource: &'a Resource) -> Self {
        Self { resource }
    }

    /// The scheduler-minted reservation ID, if the resource carries one.
    ///
    /// An empty label is treated the same as a missing one.
    pub fn resource_id(&self) -> Option<&'a str> {
        self.resource
            .reservation_labels()
            .and_then(|labels| labels.get(keys::RESOURCE_ID))
            .filter(|id| !id.is_empty())
    }

    /// The port previously assigned under `name`, if recorded.
    pub fn port(&self, name: &str) -> Option<u64> {
        let labels = self.resource.reservation_labels()?;
        let raw = labels.get(&port_label_key(name))?;
        parse_port(name, raw)
    }

    /// Every recorded port assignment on this resource, in name order.
    ///
    /// Unparsable entries are skipped with a warning rather than failing the
    /// whole scan.
    pub fn ports(&self) -> Vec<(String, u64)> {
        let Some(labels) = self.resource.reservation_labels() else {
            return Vec::new();
        };
        labels
            .iter()
            .filter_map(|(key, raw)| {
                let name = key.strip_prefix(keys::PORT_LABEL_PREFIX)?;
                parse_port(name, raw).map(|port| (name.to_string(), port))
            })
            .collect()
    }
}

fn port_label_key(name: &str) -> String {
    format!("{}{name}", keys::PORT_LABEL_PREFIX)
}

fn parse_port(name: &str, raw: &str) -> Option<u64> {
    match raw.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!(port = name, value = raw, "ignoring unparsable port label");
            None
        }
    }
}

/// Copy of `resource` with its reservation ID replaced.
pub fn set_resource_id(resource: &Resource, id: &str) -> Resource {
    let mut labels = resource
        .reservation_labels()
        .cloned()
        .unwrap_or_else(KeyValueMap::new);
    labels.put(keys::RESOURCE_ID, id);
    resource.with_reservation_labels(labels)
}

/// Copy of `resource` with the assignment of `name` recorded.
pub fn set_port(resource: &Resource, name: &str, port: u64) -> Resource {
    let mut labels = resource
        .reservation_labels()
        .cloned()
        .unwrap_or_else(KeyValueMap::new);
    labels.put(port_label_key(name), port.to_string());
    resource.with_reservation_labels(labels)
}

/// Look up a previously assigned port by name across a task's resources.
///
/// Only the ports resource can carry port labels, but scanning all resources
/// keeps the lookup robust against reordered resource lists.
pub fn find_port(resources: &[Resource], name: &str) -> Option<u64> {
    resources
        .iter()
        .filter(|r| r.name == PORTS_RESOURCE_NAME)
        .find_map(|r| ResourceLabelReader::new(r).port(name))
}

/// Rewrite a reservation ID to mark the reservation as logically released.
///
/// Idempotent: an already-tombstoned ID comes back unchanged.
pub fn tombstoned(resource_id: &str) -> String {
    if is_tombstoned(resource_id) {
        resource_id.to_string()
    } else {
        format!("{}{resource_id}", keys::TOMBSTONE_MARKER)
    }
}

pub fn is_tombstoned(resource_id: &str) -> bool {
    resource_id.starts_with(keys::TOMBSTONE_MARKER)
}

/// The original reservation ID behind a tombstone marker.
pub fn strip_tombstone(resource_id: &str) -> &str {
    resource_id
        .strip_prefix(keys::TOMBSTONE_MARKER)
        .unwrap_or(resource_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reservoir_model::{Range, Value};

    fn reserved_cpus() -> Resource {
        Resource::desired("cpus", Value::Scalar(1.0), "role", "principal")
    }

    fn ports_resource() -> Resource {
        Resource::desired(
            PORTS_RESOURCE_NAME,
            Value::Ranges(vec![Range::single(31000)]),
            "role",
            "principal",
        )
    }

    #[test]
    fn resource_id_set_and_read() {
        let resource = set_resource_id(&reserved_cpus(), "id-1");
        assert_eq!(ResourceLabelReader::new(&resource).resource_id(), Some("id-1"));
    }

    #[test]
    fn empty_resource_id_reads_as_absent() {
        let resource = set_resource_id(&reserved_cpus(), "");
        assert!(ResourceLabelReader::new(&resource).resource_id().is_none());
        assert!(ResourceLabelReader::new(&reserved_cpus()).resource_id().is_none());
    }

    #[test]
    fn port_labels_round_trip() {
        let resource = set_port(&set_port(&ports_resource(), "http", 31000), "admin", 31001);
        let reader = ResourceLabelReader::new(&resource);
        assert_eq!(reader.port("http"), Some(31000));
        assert_eq!(reader.port("admin"), Some(31001));
        assert_eq!(
            reader.ports(),
            vec![("admin".to_string(), 31001), ("http".to_string(), 31000)]
        );
    }

    #[test]
    fn unparsable_port_label_is_skipped() {
        let mut labels = KeyValueMap::new();
        labels.put(port_label_key("http"), "not-a-port");
        labels.put(port_label_key("admin"), "31001");
        let resource = ports_resource().with_reservation_labels(labels);
        let reader = ResourceLabelReader::new(&resource);
        assert!(reader.port("http").is_none());
        assert_eq!(reader.ports(), vec![("admin".to_string(), 31001)]);
    }

    #[test]
    fn find_port_scans_only_ports_resources() {
        // A stray port-prefixed label on cpus must not satisfy the lookup.
        let cpus = set_port(&reserved_cpus(), "http", 9999);
        let ports = set_port(&ports_resource(), "http", 31000);
        assert_eq!(find_port(&[cpus, ports], "http"), Some(31000));
        assert!(find_port(&[reserved_cpus()], "http").is_none());
    }

    #[test]
    fn tombstone_is_idempotent_and_reversible() {
        let id = "abc";
        let dead = tombstoned(id);
        assert_eq!(dead, "uninstalled_abc");
        assert!(is_tombstoned(&dead));
        assert_eq!(tombstoned(&dead), dead);
        assert_eq!(strip_tombstone(&dead), id);
        assert_eq!(strip_tombstone(id), id);
        assert!(!is_tombstoned(id));
    }
}
