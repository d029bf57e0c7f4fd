//! Concurrent mapping tables.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use bridge_core::{DeploymentContext, DeploymentStatus};

/// What a Marathon deployment was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentIntent {
    Deploying,
    Undeploying,
}

impl DeploymentIntent {
    /// Status reported while the deployment runs.
    pub fn in_progress_status(self) -> DeploymentStatus {
        match self {
            Self::Deploying => DeploymentStatus::DeploymentInProgress,
            Self::Undeploying => DeploymentStatus::UndeploymentInProgress,
        }
    }

    /// Status reported once Marathon confirms success.
    pub fn success_status(self) -> DeploymentStatus {
        match self {
            Self::Deploying => DeploymentStatus::Deployed,
            Self::Undeploying => DeploymentStatus::Undeployed,
        }
    }
}

/// A Marathon group and the node each of its apps was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapping {
    pub topology_deployment_id: String,
    /// App local id (last id segment) → node template id.
    pub app_to_node: HashMap<String, String>,
}

/// A pending Marathon deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMapping {
    pub topology_deployment_id: String,
    pub intent: DeploymentIntent,
    /// Group the deployment touches, when known.
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    groups: Arc<RwLock<HashMap<String, GroupMapping>>>,
    deployments: Arc<Mutex<HashMap<String, DeploymentMapping>>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Groups ────────────────────────────────────────────────────

    /// Register (or overwrite) the mapping for a group.
    pub fn register_group_mapping(&self, group_id: &str, topology_deployment_id: &str) {
        let mut groups = self.groups.write().expect("groups lock");
        debug!(group_id, topology_deployment_id, "registered group mapping");
        groups.insert(
            group_id.to_string(),
            GroupMapping {
                topology_deployment_id: topology_deployment_id.to_string(),
                app_to_node: HashMap::new(),
            },
        );
    }

    /// Map an app of a registered group to its node template.
    ///
    /// `app_id` may be the full id (`group/app`) or the local segment; only
    /// the local segment is stored. Does nothing when the group is unknown.
    pub fn register_app_mapping(&self, group_id: &str, app_id: &str, node_template_id: &str) {
        let mut groups = self.groups.write().expect("groups lock");
        if let Some(mapping) = groups.get_mut(group_id) {
            mapping
                .app_to_node
                .insert(local_app_id(app_id).to_string(), node_template_id.to_string());
        }
    }

    pub fn lookup_group_mapping(&self, group_id: &str) -> Option<GroupMapping> {
        let groups = self.groups.read().expect("groups lock");
        groups.get(group_id).cloned()
    }

    /// Resolve an app to `(topology deployment id, node template id)`.
    pub fn node_template_for(&self, group_id: &str, app_id: &str) -> Option<(String, String)> {
        let groups = self.groups.read().expect("groups lock");
        let mapping = groups.get(group_id)?;
        let node = mapping.app_to_node.get(local_app_id(app_id))?;
        Some((mapping.topology_deployment_id.clone(), node.clone()))
    }

    pub fn remove_group_mapping(&self, group_id: &str) -> Option<GroupMapping> {
        let mut groups = self.groups.write().expect("groups lock");
        let removed = groups.remove(group_id);
        if removed.is_some() {
            debug!(group_id, "removed group mapping");
        }
        removed
    }

    /// Rebuild group mappings from the host's active deployments.
    pub fn rehydrate(&self, active: &[DeploymentContext]) {
        for ctx in active {
            let group_id = ctx.group_id();
            self.register_group_mapping(&group_id, &ctx.deployment_id);
            for node in &ctx.topology.non_natives {
                self.register_app_mapping(&group_id, &node.id.to_lowercase(), &node.id);
            }
        }
        debug!(count = active.len(), "rehydrated group mappings");
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().expect("groups lock").len()
    }

    // ── Deployments ───────────────────────────────────────────────

    pub fn register_deployment_intent(
        &self,
        marathon_deployment_id: &str,
        topology_deployment_id: &str,
        intent: DeploymentIntent,
        group_id: Option<&str>,
    ) {
        let mut deployments = self.deployments.lock().expect("deployments lock");
        debug!(
            marathon_deployment_id,
            topology_deployment_id,
            ?intent,
            "registered deployment intent"
        );
        deployments.insert(
            marathon_deployment_id.to_string(),
            DeploymentMapping {
                topology_deployment_id: topology_deployment_id.to_string(),
                intent,
                group_id: group_id.map(str::to_string),
            },
        );
    }

    pub fn lookup_deployment_intent(&self, marathon_deployment_id: &str) -> Option<DeploymentMapping> {
        let deployments = self.deployments.lock().expect("deployments lock");
        deployments.get(marathon_deployment_id).cloned()
    }

    /// Atomically get and remove a pending deployment.
    pub fn take_deployment_intent(&self, marathon_deployment_id: &str) -> Option<DeploymentMapping> {
        let mut deployments = self.deployments.lock().expect("deployments lock");
        deployments.remove(marathon_deployment_id)
    }

    pub fn pending_deployment_count(&self) -> usize {
        self.deployments.lock().expect("deployments lock").len()
    }
}

/// Last `/`-separated segment of an app id.
fn local_app_id(app_id: &str) -> &str {
    app_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(app_id)
}
