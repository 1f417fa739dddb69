//! Shared fixtures for the crate's tests.

use uuid::Uuid;

use reservoir_model::{
    CommandSpec, ConfigFileSpec, DISK_RESOURCE_NAME, DiskInfo, DiskSource, GoalState, KeyValueMap,
    Offer, PORTS_RESOURCE_NAME, PodInstance, PodSpec, PortSpec, Range, Resource, ResourceSet,
    ResourceSpec, TaskRecord, TaskSpec, Value, VolumeMode, VolumeSpec, VolumeType,
};

use crate::labels::TaskLabelWriter;
use crate::labels::resource::set_resource_id;
use crate::pool::ResourcePool;

pub(crate) fn target_configuration() -> Uuid {
    Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").expect("fixture uuid")
}

pub(crate) fn offer_with(resources: Vec<Resource>) -> Offer {
    Offer {
        id: "offer-1".to_string(),
        agent_id: "agent-1".to_string(),
        hostname: "node-1.example".to_string(),
        attributes: KeyValueMap::new(),
        resources,
    }
}

pub(crate) fn empty_offer() -> Offer {
    offer_with(Vec::new())
}

pub(crate) fn pool_with(resources: Vec<Resource>) -> ResourcePool {
    ResourcePool::new(&offer_with(resources))
}

pub(crate) fn offered_ports(begin: u64, end: u64) -> Resource {
    Resource::unreserved(PORTS_RESOURCE_NAME, Value::Ranges(vec![Range::new(begin, end)]))
}

pub(crate) fn scalar_spec(name: &str, value: f64) -> ResourceSpec {
    ResourceSpec {
        name: name.to_string(),
        value: Value::Scalar(value),
        role: "role".to_string(),
        principal: "principal".to_string(),
    }
}

fn task_spec(name: &str, set: ResourceSet) -> TaskSpec {
    TaskSpec {
        name: name.to_string(),
        goal: GoalState::Running,
        resource_set: set,
        command: Some(CommandSpec {
            value: format!("./{name}"),
            environment: KeyValueMap::new(),
        }),
        config_files: vec![],
        readiness_check: None,
        health_check: None,
    }
}

fn pod(tasks: Vec<TaskSpec>) -> PodSpec {
    PodSpec {
        pod_type: "pod".to_string(),
        count: 1,
        image: None,
        networks: vec![],
        uris: vec![],
        volumes: vec![],
        tasks,
    }
}

/// `task1` on resource set `rs-a`, `task2` on `rs-b`.
pub(crate) fn two_set_pod_instance() -> PodInstance {
    let rs_a = ResourceSet {
        id: "rs-a".to_string(),
        resources: vec![scalar_spec("cpus", 1.0)],
        ports: vec![],
        volumes: vec![],
    };
    let rs_b = ResourceSet {
        id: "rs-b".to_string(),
        resources: vec![scalar_spec("mem", 512.0)],
        ports: vec![],
        volumes: vec![],
    };
    PodInstance::new(pod(vec![task_spec("task1", rs_a), task_spec("task2", rs_b)]), 0)
}

/// `task1` and `task2` sharing one resource set.
pub(crate) fn shared_set_pod_instance() -> PodInstance {
    let shared = ResourceSet {
        id: "rs-shared".to_string(),
        resources: vec![scalar_spec("cpus", 1.0)],
        ports: vec![],
        volumes: vec![],
    };
    PodInstance::new(
        pod(vec![
            task_spec("task1", shared.clone()),
            task_spec("task2", shared),
        ]),
        0,
    )
}

/// Single `server` task with cpus 1.0, mem 512 and the given named ports.
pub(crate) fn pod_instance_with_ports(ports: &[(&str, u64)]) -> PodInstance {
    let set = ResourceSet {
        id: "rs".to_string(),
        resources: vec![scalar_spec("cpus", 1.0), scalar_spec("mem", 512.0)],
        ports: ports
            .iter()
            .map(|(name, port)| PortSpec {
                name: name.to_string(),
                port: *port,
                env_key: None,
            })
            .collect(),
        volumes: vec![],
    };
    PodInstance::new(pod(vec![task_spec("server", set)]), 0)
}

/// Two tasks on separate resource sets, each wanting one dynamic `http`
/// port.
pub(crate) fn two_task_ports_pod_instance() -> PodInstance {
    let set = |id: &str| ResourceSet {
        id: id.to_string(),
        resources: vec![scalar_spec("cpus", 1.0)],
        ports: vec![PortSpec {
            name: "http".to_string(),
            port: 0,
            env_key: None,
        }],
        volumes: vec![],
    };
    PodInstance::new(
        pod(vec![task_spec("task1", set("rs-a")), task_spec("task2", set("rs-b"))]),
        0,
    )
}

/// Single `server` task with cpus 2.0 and a 1000 MB root volume at `/data`.
pub(crate) fn pod_instance_with_volume() -> PodInstance {
    let set = ResourceSet {
        id: "rs".to_string(),
        resources: vec![scalar_spec("cpus", 2.0)],
        ports: vec![],
        volumes: vec![VolumeSpec {
            container_path: "/data".to_string(),
            size_mb: 1000.0,
            volume_type: VolumeType::Root,
            role: "role".to_string(),
            principal: "principal".to_string(),
        }],
    };
    PodInstance::new(pod(vec![task_spec("server", set)]), 0)
}

/// Single `server` task declaring one config-file template.
pub(crate) fn pod_instance_with_config_file() -> PodInstance {
    let set = ResourceSet {
        id: "rs".to_string(),
        resources: vec![scalar_spec("cpus", 1.0)],
        ports: vec![],
        volumes: vec![],
    };
    let mut task = task_spec("server", set);
    task.config_files = vec![ConfigFileSpec {
        name: "server.conf".to_string(),
        relative_path: "conf/server.conf".to_string(),
    }];
    PodInstance::new(pod(vec![task]), 0)
}

/// A persisted record for one of the instance's tasks, labeled the way a
/// prior launch would have left it.
pub(crate) fn launched_record(instance: &PodInstance, task_name: &str) -> TaskRecord {
    let task_spec = instance.pod.task(task_name).expect("fixture task");
    TaskRecord {
        name: instance.task_instance_name(task_spec),
        task_id: format!("{}-{}", instance.task_instance_name(task_spec), "uuid"),
        agent_id: "agent-1".to_string(),
        labels: TaskLabelWriter::new()
            .set_type(&instance.pod.pod_type)
            .set_index(instance.index)
            .set_goal_state(GoalState::Running)
            .set_target_configuration(target_configuration())
            .build(),
        ..Default::default()
    }
}

/// An already-created root volume as it would reappear in an offer.
pub(crate) fn created_volume(
    resource_id: &str,
    persistence_id: &str,
    size_mb: f64,
    container_path: &str,
) -> Resource {
    let mut resource = Resource::desired(
        DISK_RESOURCE_NAME,
        Value::Scalar(size_mb),
        "role",
        "principal",
    );
    resource.disk = Some(DiskInfo {
        persistence_id: persistence_id.to_string(),
        principal: "principal".to_string(),
        container_path: container_path.to_string(),
        mode: VolumeMode::ReadWrite,
        source: DiskSource::Root,
    });
    set_resource_id(&resource, resource_id)
}
