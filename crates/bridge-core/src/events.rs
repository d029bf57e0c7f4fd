//! Normalized lifecycle events.
//!
//! These are shaped by the bridge, not by Marathon: ids are topology ids,
//! statuses are host statuses, and every event carries a millisecond
//! UTC timestamp.

use serde::{Deserialize, Serialize};

use crate::status::{DeploymentStatus, InstanceStatus};

/// Deployment id reported when a Marathon deployment id has no mapping.
pub const UNKNOWN_DEPLOYMENT_ID: &str = "unknown_deployment_id";

/// Deployment id reported when an app's group has no mapping.
pub const UNKNOWN_DEPLOYMENT: &str = "UNKNOWN_DEPLOYMENT";

/// Node template id reported when an app has no mapping.
pub const UNKNOWN_NODE: &str = "UNKNOWN_NODE";

/// A deployment changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatusEvent {
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    pub deployment_id: String,
    pub status: DeploymentStatus,
    /// Reported by `deployment_info` rather than a deployment outcome.
    /// Progress reports may be dropped under queue back-pressure whatever
    /// their status, unmapped ones included.
    #[serde(default)]
    pub progress: bool,
}

impl DeploymentStatusEvent {
    /// A `deployment_info` report.
    pub fn progress(date: i64, deployment_id: impl Into<String>, status: DeploymentStatus) -> Self {
        Self {
            date,
            deployment_id: deployment_id.into(),
            status,
            progress: true,
        }
    }

    /// A `deployment_success` or `deployment_failed` report.
    pub fn outcome(date: i64, deployment_id: impl Into<String>, status: DeploymentStatus) -> Self {
        Self {
            date,
            deployment_id: deployment_id.into(),
            status,
            progress: false,
        }
    }
}

/// A container instance changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStateEvent {
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    pub deployment_id: String,
    pub node_template_id: String,
    /// Marathon task id.
    pub instance_id: String,
    /// `None` when the event leaves the state unchanged.
    pub instance_state: Option<String>,
    pub instance_status: InstanceStatus,
}

/// Any event the host can drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorEvent {
    DeploymentStatus(DeploymentStatusEvent),
    InstanceState(InstanceStateEvent),
}

impl MonitorEvent {
    pub fn date(&self) -> i64 {
        match self {
            Self::DeploymentStatus(e) => e.date,
            Self::InstanceState(e) => e.date,
        }
    }

    pub fn deployment_id(&self) -> &str {
        match self {
            Self::DeploymentStatus(e) => &e.deployment_id,
            Self::InstanceState(e) => &e.deployment_id,
        }
    }

    /// Deployment outcomes must survive queue back-pressure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DeploymentStatus(e) if !e.progress)
    }

    /// Deployment progress reports (from `deployment_info`).
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::DeploymentStatus(e) if e.progress)
    }
}

impl From<DeploymentStatusEvent> for MonitorEvent {
    fn from(event: DeploymentStatusEvent) -> Self {
        Self::DeploymentStatus(event)
    }
}

impl From<InstanceStateEvent> for MonitorEvent {
    fn from(event: InstanceStateEvent) -> Self {
        Self::InstanceState(event)
    }
}
