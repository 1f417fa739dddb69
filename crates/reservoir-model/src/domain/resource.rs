use serde::{Deserialize, Serialize};

use crate::{ANY_ROLE, DISK_RESOURCE_NAME, KeyValueMap, Value};

/// A reservation earmarking a resource for a role's principal, carrying the
/// opaque bookkeeping labels attached by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub principal: String,
    #[serde(default, skip_serializing_if = "KeyValueMap::is_empty")]
    pub labels: KeyValueMap,
}

/// Mount mode for a persistent volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeMode {
    ReadWrite,
    ReadOnly,
}

/// Where a disk resource's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiskSource {
    /// Carved out of the agent's root filesystem.
    Root,
    /// A dedicated mount point, consumed whole.
    Mount { root: Option<String> },
}

/// Volume descriptor attached to a disk resource.
///
/// An empty `persistence_id` marks a volume that has been requested but not
/// yet created on an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub persistence_id: String,
    pub principal: String,
    pub container_path: String,
    pub mode: VolumeMode,
    pub source: DiskSource,
}

/// A named quantity of one kind offered by, or reserved on, an agent.
///
/// Resources are immutable values: every mutation produces a new `Resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub value: Value,
    /// Role the resource is (or would be) reserved for; `"*"` is unreserved.
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskInfo>,
}

impl Resource {
    /// An unreserved resource as it appears in an offer.
    pub fn unreserved<N: Into<String>>(name: N, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            role: ANY_ROLE.to_string(),
            reservation: None,
            disk: None,
        }
    }

    /// An unreserved mount-disk resource as it appears in an offer.
    pub fn unreserved_mount_disk(size_mb: f64, mount_root: &str) -> Self {
        let mut resource = Self::unreserved(DISK_RESOURCE_NAME, Value::Scalar(size_mb));
        resource.disk = Some(DiskInfo {
            persistence_id: String::new(),
            principal: String::new(),
            container_path: String::new(),
            mode: VolumeMode::ReadWrite,
            source: DiskSource::Mount {
                root: Some(mount_root.to_string()),
            },
        });
        resource
    }

    /// A freshly desired (not yet matched) resource derived from a spec.
    pub fn desired<N, R, P>(name: N, value: Value, role: R, principal: P) -> Self
    where
        N: Into<String>,
        R: Into<String>,
        P: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            role: role.into(),
            reservation: Some(Reservation {
                principal: principal.into(),
                labels: KeyValueMap::new(),
            }),
            disk: None,
        }
    }

    /// A freshly desired root-disk volume.
    pub fn desired_root_volume(role: &str, principal: &str, size_mb: f64, container_path: &str) -> Self {
        let mut resource = Self::desired(DISK_RESOURCE_NAME, Value::Scalar(size_mb), role, principal);
        resource.disk = Some(DiskInfo {
            persistence_id: String::new(),
            principal: principal.to_string(),
            container_path: container_path.to_string(),
            mode: VolumeMode::ReadWrite,
            source: DiskSource::Root,
        });
        resource
    }

    /// A freshly desired dedicated-mount volume. The concrete mount root is
    /// only known once an offer has been matched.
    pub fn desired_mount_volume(role: &str, principal: &str, size_mb: f64, container_path: &str) -> Self {
        let mut resource = Self::desired_root_volume(role, principal, size_mb, container_path);
        if let Some(disk) = resource.disk.as_mut() {
            disk.source = DiskSource::Mount { root: None };
        }
        resource
    }

    pub fn is_unreserved(&self) -> bool {
        self.role == ANY_ROLE && self.reservation.is_none()
    }

    /// Mount-sourced disks are atomic: consumed whole, never split.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.disk.as_ref().map(|d| &d.source),
            Some(DiskSource::Mount { .. })
        )
    }

    pub fn has_volume(&self) -> bool {
        self.disk
            .as_ref()
            .is_some_and(|d| !d.container_path.is_empty())
    }

    pub fn container_path(&self) -> Option<&str> {
        self.disk
            .as_ref()
            .map(|d| d.container_path.as_str())
            .filter(|p| !p.is_empty())
    }

    pub fn persistence_id(&self) -> Option<&str> {
        self.disk
            .as_ref()
            .map(|d| d.persistence_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Reservation labels, if the resource carries a reservation.
    pub fn reservation_labels(&self) -> Option<&KeyValueMap> {
        self.reservation.as_ref().map(|r| &r.labels)
    }

    /// Copy with a different value.
    pub fn with_value(&self, value: Value) -> Self {
        let mut out = self.clone();
        out.value = value;
        out
    }

    /// Copy with the reservation labels replaced. Adds an empty reservation
    /// if the resource had none.
    pub fn with_reservation_labels(&self, labels: KeyValueMap) -> Self {
        let mut out = self.clone();
        match out.reservation.as_mut() {
            Some(reservation) => reservation.labels = labels,
            None => {
                out.reservation = Some(Reservation {
                    principal: String::new(),
                    labels,
                })
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Range;

    #[test]
    fn unreserved_resource_has_any_role() {
        let r = Resource::unreserved("cpus", Value::Scalar(2.0));
        assert!(r.is_unreserved());
        assert!(!r.is_atomic());
        assert!(r.reservation_labels().is_none());
    }

    #[test]
    fn desired_resource_carries_role_and_principal() {
        let r = Resource::desired("mem", Value::Scalar(512.0), "svc-role", "svc-principal");
        assert_eq!(r.role, "svc-role");
        assert_eq!(r.reservation.as_ref().unwrap().principal, "svc-principal");
        assert!(!r.is_unreserved());
    }

    #[test]
    fn mount_volume_is_atomic() {
        let root = Resource::desired_root_volume("role", "principal", 1000.0, "/data");
        let mount = Resource::desired_mount_volume("role", "principal", 1000.0, "/data");
        assert!(!root.is_atomic());
        assert!(mount.is_atomic());
        assert_eq!(mount.container_path(), Some("/data"));
        assert!(mount.persistence_id().is_none());
    }

    #[test]
    fn with_value_leaves_original_untouched() {
        let r = Resource::unreserved("ports", Value::Ranges(vec![Range::new(1, 10)]));
        let narrowed = r.with_value(Value::Ranges(vec![Range::single(5)]));
        assert_eq!(r.value, Value::Ranges(vec![Range::new(1, 10)]));
        assert_eq!(narrowed.value, Value::Ranges(vec![Range::single(5)]));
    }

    #[test]
    fn with_reservation_labels_adds_reservation() {
        let r = Resource::unreserved("cpus", Value::Scalar(1.0));
        let labeled = r.with_reservation_labels([("resource_id", "abc")].into_iter().collect());
        assert_eq!(
            labeled.reservation_labels().unwrap().get("resource_id"),
            Some("abc")
        );
    }
}
