//! Deployment status reconciliation against Marathon.
//!
//! ```text
//! GET /v2/groups/<group>        404 → UNDEPLOYED
//! GET /v2/deployments           touching /<group>/… → (UN)DEPLOYMENT_IN_PROGRESS
//! GET /v2/apps/<app> per app    unhealthy tasks + vanished app → FAILURE
//!                               otherwise → DEPLOYED
//! ```

use tracing::debug;

use bridge_core::DeploymentStatus;
use bridge_marathon::{ClientResult, Deployment, MarathonClient, RetryPolicy, retry_read};

/// Marathon action name of an app being stopped.
pub const STOP_APPLICATION: &str = "StopApplication";

/// Derive the status of `group_id` from Marathon's current view.
pub async fn deployment_status(
    client: &MarathonClient,
    retry: &RetryPolicy,
    group_id: &str,
) -> ClientResult<DeploymentStatus> {
    let group = match retry_read(retry, "get group", || client.get_group(group_id)).await {
        Ok(group) => group,
        Err(e) if e.is_not_found() => return Ok(DeploymentStatus::Undeployed),
        Err(e) => return Err(e),
    };

    let deployments = retry_read(retry, "get deployments", || client.get_deployments()).await?;
    if let Some(status) = in_progress_status(&deployments, group_id) {
        return Ok(status);
    }

    let mut unhealthy = 0;
    let mut vanished = 0;
    for app in &group.apps {
        match retry_read(retry, "get app", || client.get_app(&app.id)).await {
            Ok(current) => unhealthy += current.tasks_unhealthy.unwrap_or(0),
            Err(e) if e.is_not_found() => {
                debug!(app_id = %app.id, "app vanished from group");
                vanished += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(settled_status(unhealthy, vanished))
}

/// Status of the first active deployment touching the group, if any.
pub fn in_progress_status(deployments: &[Deployment], group_id: &str) -> Option<DeploymentStatus> {
    let prefix = format!("/{}/", group_id.trim_matches('/'));
    deployments
        .iter()
        .find(|deployment| {
            deployment
                .affected_apps
                .iter()
                .any(|app| app.starts_with(&prefix))
        })
        .map(|deployment| {
            if deployment.has_action(STOP_APPLICATION) {
                DeploymentStatus::UndeploymentInProgress
            } else {
                DeploymentStatus::DeploymentInProgress
            }
        })
}

/// FAILURE only when unhealthy tasks coincide with vanished apps.
fn settled_status(unhealthy_tasks: u32, vanished_apps: u32) -> DeploymentStatus {
    if unhealthy_tasks > 0 && vanished_apps > 0 {
        DeploymentStatus::Failure
    } else {
        DeploymentStatus::Deployed
    }
}
