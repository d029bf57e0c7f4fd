//! Per-node instance information from Marathon tasks.

use std::collections::BTreeMap;

use tracing::debug;

use bridge_core::{DeploymentContext, InstanceInformation, InstanceStatus, translate_task_status};
use bridge_marathon::{ClientResult, MarathonClient, RetryPolicy, Task, retry_read};

/// Node template id → task id → instance information.
pub type InstancesInformation = BTreeMap<String, BTreeMap<String, InstanceInformation>>;

pub const IP_ADDRESS: &str = "ip_address";
pub const PORTS: &str = "ports";

/// Collect the tasks of every app in the deployment's group.
///
/// Nodes whose app no longer exists are omitted.
pub async fn instances_information(
    client: &MarathonClient,
    retry: &RetryPolicy,
    ctx: &DeploymentContext,
) -> ClientResult<InstancesInformation> {
    let group_id = ctx.group_id();
    let mut result = InstancesInformation::new();

    for node in &ctx.topology.non_natives {
        let app_id = format!("{group_id}/{}", node.id.to_lowercase());
        let tasks = match retry_read(retry, "get app tasks", || client.get_app_tasks(&app_id)).await {
            Ok(tasks) => tasks,
            Err(e) if e.is_not_found() => {
                debug!(%app_id, node = %node.id, "no app for node, omitting");
                continue;
            }
            Err(e) => return Err(e),
        };

        let instances = tasks
            .iter()
            .map(|task| (task.id.clone(), task_information(task)))
            .collect();
        result.insert(node.id.clone(), instances);
    }

    Ok(result)
}

/// Translate one task. A running task failing a health check is FAILURE.
pub fn task_information(task: &Task) -> InstanceInformation {
    let (state, mut status) = translate_task_status(&task.state);
    if status == InstanceStatus::Success && task.has_failed_health_check() {
        status = InstanceStatus::Failure;
    }

    let mut runtime_properties = BTreeMap::new();
    runtime_properties.insert(IP_ADDRESS.to_string(), task.host.clone());
    let ports: Vec<String> = task.ports.iter().map(u32::to_string).collect();
    runtime_properties.insert(PORTS.to_string(), ports.join(","));

    InstanceInformation {
        state,
        status,
        runtime_properties,
    }
}
