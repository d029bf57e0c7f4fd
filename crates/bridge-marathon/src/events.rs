//! Typed payloads of the Marathon event bus (`/v2/events`).

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::EventDecodeError;

pub const STATUS_UPDATE_EVENT: &str = "status_update_event";
pub const HEALTH_STATUS_CHANGED_EVENT: &str = "health_status_changed_event";
pub const DEPLOYMENT_INFO: &str = "deployment_info";
pub const DEPLOYMENT_SUCCESS: &str = "deployment_success";
pub const DEPLOYMENT_FAILED: &str = "deployment_failed";
pub const UNHEALTHY_TASK_KILL_EVENT: &str = "unhealthy_task_kill_event";

/// Event names the bridge subscribes to; everything else is ignored.
pub const SUBSCRIBED_EVENTS: [&str; 6] = [
    STATUS_UPDATE_EVENT,
    HEALTH_STATUS_CHANGED_EVENT,
    DEPLOYMENT_SUCCESS,
    DEPLOYMENT_FAILED,
    DEPLOYMENT_INFO,
    UNHEALTHY_TASK_KILL_EVENT,
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateEvent {
    #[serde(default)]
    pub timestamp: String,
    pub app_id: String,
    pub task_id: String,
    pub task_status: String,
    #[serde(default)]
    pub slave_id: String,
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusChangedEvent {
    #[serde(default)]
    pub timestamp: String,
    pub app_id: String,
    pub task_id: String,
    pub alive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfoEvent {
    #[serde(default)]
    pub timestamp: String,
    pub plan: DeploymentPlan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub id: String,
}

/// Body of both `deployment_success` and `deployment_failed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcomeEvent {
    #[serde(default)]
    pub timestamp: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnhealthyTaskKillEvent {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub task_id: String,
}

/// A decoded Marathon event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarathonEvent {
    StatusUpdate(StatusUpdateEvent),
    HealthStatusChanged(HealthStatusChangedEvent),
    DeploymentInfo(DeploymentInfoEvent),
    DeploymentSuccess(DeploymentOutcomeEvent),
    DeploymentFailed(DeploymentOutcomeEvent),
    UnhealthyTaskKill(UnhealthyTaskKillEvent),
}

impl MarathonEvent {
    /// Decode an SSE frame. Unsubscribed event names yield `Ok(None)`.
    pub fn decode(name: &str, data: &str) -> Result<Option<Self>, EventDecodeError> {
        let event = match name {
            STATUS_UPDATE_EVENT => Self::StatusUpdate(parse(name, data)?),
            HEALTH_STATUS_CHANGED_EVENT => Self::HealthStatusChanged(parse(name, data)?),
            DEPLOYMENT_INFO => Self::DeploymentInfo(parse(name, data)?),
            DEPLOYMENT_SUCCESS => Self::DeploymentSuccess(parse(name, data)?),
            DEPLOYMENT_FAILED => Self::DeploymentFailed(parse(name, data)?),
            UNHEALTHY_TASK_KILL_EVENT => Self::UnhealthyTaskKill(parse(name, data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusUpdate(_) => STATUS_UPDATE_EVENT,
            Self::HealthStatusChanged(_) => HEALTH_STATUS_CHANGED_EVENT,
            Self::DeploymentInfo(_) => DEPLOYMENT_INFO,
            Self::DeploymentSuccess(_) => DEPLOYMENT_SUCCESS,
            Self::DeploymentFailed(_) => DEPLOYMENT_FAILED,
            Self::UnhealthyTaskKill(_) => UNHEALTHY_TASK_KILL_EVENT,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::StatusUpdate(e) => &e.timestamp,
            Self::HealthStatusChanged(e) => &e.timestamp,
            Self::DeploymentInfo(e) => &e.timestamp,
            Self::DeploymentSuccess(e) | Self::DeploymentFailed(e) => &e.timestamp,
            Self::UnhealthyTaskKill(e) => &e.timestamp,
        }
    }
}

fn parse<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, EventDecodeError> {
    serde_json::from_str(data).map_err(|source| EventDecodeError {
        event: name.to_string(),
        source,
    })
}
