use tracing::warn;

use reservoir_model::{CommandRecord, TaskRecord};

use crate::error::DecodeError;
use crate::labels::task::{TaskLabelReader, TaskLabelWriter};

/// Index of the pod instance a task belongs to.
pub const POD_INSTANCE_INDEX: &str = "POD_INSTANCE_INDEX";
/// Name of the owning framework, for tasks that build endpoint addresses.
pub const FRAMEWORK_NAME: &str = "FRAMEWORK_NAME";
/// The task's own name.
pub const TASK_NAME: &str = "TASK_NAME";

/// Prefix for assigned-port exports, e.g. `PORT_HTTP`.
pub const PORT_ENV_PREFIX: &str = "PORT_";
/// Prefix marking a fetched URI as a config-file template.
pub const CONFIG_TEMPLATE_PREFIX: &str = "CONFIG_TEMPLATE_";
/// Directory config-file templates are downloaded into.
pub const CONFIG_TEMPLATE_DOWNLOAD_DIR: &str = "config-templates/";

/// Normalize an arbitrary name into an environment variable name:
/// uppercased, with every non-alphanumeric character replaced by `_`.
pub fn to_env_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// The environment variable a named port is exported under. A custom key on
/// the port spec wins over the derived `PORT_<NAME>` form.
pub fn port_env_name(port_name: &str, custom_key: Option<&str>) -> String {
    match custom_key {
        Some(key) => key.to_string(),
        None => format!("{PORT_ENV_PREFIX}{}", to_env_name(port_name)),
    }
}

/// Export an assigned port into every environment the task's process and its
/// probes see: the main command env, the health check env, and the env of the
/// readiness check embedded in the task's labels.
pub fn set_port_env(
    task: &mut TaskRecord,
    port_name: &str,
    custom_key: Option<&str>,
    port: u64,
) -> Result<(), DecodeError> {
    let key = port_env_name(port_name, custom_key);
    let value = port.to_string();

    task.command
        .get_or_insert_with(CommandRecord::default)
        .environment
        .put(&key, &value);

    if let Some(health) = task.health_check.as_mut() {
        health.env.put(&key, &value);
    }

    let readiness = TaskLabelReader::new(task).readiness_check()?;
    if let Some(mut readiness) = readiness {
        readiness.env.put(&key, &value);
        task.labels = TaskLabelWriter::from_task(task)
            .set_readiness_check(&readiness)?
            .build();
    }
    Ok(())
}

/// Recover a previously assigned port from a task's exported environment.
///
/// Fallback path for tasks written before port labels existed on the
/// reservation. An unparsable value is logged and treated as absent.
pub fn legacy_port_from_env(
    task: &TaskRecord,
    port_name: &str,
    custom_key: Option<&str>,
) -> Option<u64> {
    let key = port_env_name(port_name, custom_key);
    let command = task.command.as_ref()?;
    let raw = command.environment.get(&key)?;
    match raw.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!(task = %task.name, env = %key, value = raw, "ignoring unparsable port envvar");
            None
        }
    }
}
