//! Host-facing lifecycle statuses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status of a whole topology deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Deployed,
    Undeployed,
    DeploymentInProgress,
    UndeploymentInProgress,
    Failure,
    Unknown,
}

impl DeploymentStatus {
    /// Terminal statuses end a Marathon deployment.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            Self::DeploymentInProgress | Self::UndeploymentInProgress
        )
    }
}

/// Status of a single container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Success,
    Processing,
    Failure,
    Maintenance,
}

/// Runtime view of one instance, as reported by `getInstancesInformation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInformation {
    pub state: String,
    pub status: InstanceStatus,
    pub runtime_properties: BTreeMap<String, String>,
}

/// Translate a Mesos task status into a normalized `(state, status)` pair.
///
/// Unrecognized statuses keep their raw name as state and report `Processing`.
pub fn translate_task_status(task_status: &str) -> (String, InstanceStatus) {
    match task_status {
        "TASK_STAGING" => ("creating".to_string(), InstanceStatus::Processing),
        "TASK_STARTING" => ("starting".to_string(), InstanceStatus::Processing),
        "TASK_RUNNING" => ("started".to_string(), InstanceStatus::Success),
        "TASK_ERROR" | "TASK_LOST" => ("stopped".to_string(), InstanceStatus::Failure),
        "TASK_KILLED" => ("deleted".to_string(), InstanceStatus::Maintenance),
        other => (other.to_string(), InstanceStatus::Processing),
    }
}
