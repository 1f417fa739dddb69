mod kv;
pub use kv::KeyValueMap;

mod value;
pub use value::{Range, Value, ValueError, merge_ranges, ranges_contain, subtract_ranges};

mod resource;
pub use resource::{DiskInfo, DiskSource, Reservation, Resource, VolumeMode};

mod spec;
pub use spec::{
    CheckSpec, CommandSpec, ConfigFileSpec, GoalState, PodSpec, PortSpec, ResourceSet,
    ResourceSpec, TaskSpec, VolumeSpec, VolumeType,
};

mod pod;
pub use pod::{PodInstance, PodInstanceRequirement, RecoveryType};

mod record;
pub use record::{
    CommandRecord, ContainerRecord, ExecutorRecord, Offer, TaskRecord, TaskState, TaskStatus,
};

/// Role value for resources that are not reserved for any role.
pub const ANY_ROLE: &str = "*";

/// Resource name under which network ports are offered and reserved.
pub const PORTS_RESOURCE_NAME: &str = "ports";

/// Resource name under which storage is offered and reserved.
pub const DISK_RESOURCE_NAME: &str = "disk";
