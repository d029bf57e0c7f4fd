//! Marathon v2 documents.
//!
//! Only the fields the bridge reads or writes are modelled. Unknown fields in
//! Marathon responses are ignored; collections tolerate `null`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Container type of every app the bridge emits.
pub const DOCKER: &str = "DOCKER";

/// Volume driver for external volumes.
pub const REXRAY: &str = "rexray";

/// Docker volume driver option key understood by the dvdi provider.
pub const DVDI_DRIVER_OPTION: &str = "dvdi/driver";

/// Label that exposes an app's service ports through marathon-lb.
pub const HAPROXY_GROUP_LABEL: &str = "HAPROXY_GROUP";

/// Accept `null` where a collection is expected.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Groups & apps ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub apps: Vec<App>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Group {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|app| app.id == id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub cpus: f64,
    #[serde(default)]
    pub mem: f64,
    #[serde(default)]
    pub instances: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_staged: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_running: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_healthy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_unhealthy: Option<u32>,
}

impl App {
    pub fn docker(&self) -> Option<&Docker> {
        self.container.as_ref().map(|container| &container.docker)
    }

    pub fn volumes(&self) -> &[ExternalVolume] {
        self.container
            .as_ref()
            .map(|container| container.volumes.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(rename = "type")]
    pub container_type: String,
    #[serde(default)]
    pub docker: Docker,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<ExternalVolume>,
}

impl Container {
    pub fn docker(docker: Docker) -> Self {
        Self {
            container_type: DOCKER.to_string(),
            docker,
            volumes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub network: NetworkMode,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkMode {
    #[default]
    Host,
    Bridge,
    User,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default)]
    pub container_port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// A `docker run` option, passed as `--key=value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

// ── Volumes ───────────────────────────────────────────────────────

/// An external (dvdi) volume mounted into a Docker container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVolume {
    #[serde(default)]
    pub container_path: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub external: ExternalVolumeInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVolumeInfo {
    pub name: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub options: BTreeMap<String, String>,
}

impl ExternalVolume {
    /// A read-write rexray volume, sized in GB.
    pub fn rexray(container_path: &str, name: Option<&str>, size: u32) -> Self {
        let mut options = BTreeMap::new();
        options.insert(DVDI_DRIVER_OPTION.to_string(), REXRAY.to_string());
        Self {
            container_path: container_path.to_string(),
            mode: "RW".to_string(),
            external: ExternalVolumeInfo {
                name: name.map(str::to_string),
                provider: "dvdi".to_string(),
                size: Some(size),
                options,
            },
        }
    }

    pub fn driver(&self) -> Option<&str> {
        self.external
            .options
            .get(DVDI_DRIVER_OPTION)
            .map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.external.name.as_deref()
    }
}

// ── Health checks ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub grace_period_seconds: u32,
    #[serde(default)]
    pub interval_seconds: u32,
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

impl Default for HealthCheck {
    /// TCP on the first port, 300s grace, 15s interval, one failure allowed.
    fn default() -> Self {
        Self {
            protocol: "TCP".to_string(),
            port_index: Some(0),
            path: None,
            grace_period_seconds: 300,
            interval_seconds: 15,
            max_consecutive_failures: 1,
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ports: Vec<u32>,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub health_check_results: Vec<HealthCheckResult>,
}

impl Task {
    /// Whether any health check reported this task dead.
    pub fn has_failed_health_check(&self) -> bool {
        self.health_check_results.iter().any(|result| !result.alive)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    #[serde(default)]
    pub alive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TasksResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppResponse {
    pub app: App,
}

/// Partial app body for `PUT /v2/apps/<id>`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppUpdate {
    pub instances: u32,
}

// ── Deployments ───────────────────────────────────────────────────

/// An active Marathon deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub affected_apps: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub current_actions: Vec<DeploymentAction>,
}

impl Deployment {
    pub fn has_action(&self, action: &str) -> bool {
        self.current_actions.iter().any(|a| a.action == action)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentAction {
    #[serde(alias = "type", default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

/// Body returned by group/app writes.
///
/// Marathon answers either `{deploymentId, version}` or
/// `{deployments: [{id}], version}` depending on the endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<DeploymentRef>,
}

impl DeploymentResult {
    /// Every Marathon deployment id in the result, first-seen order.
    pub fn deployment_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let all = self
            .deployment_id
            .iter()
            .chain(self.deployments.iter().map(|d| &d.id));
        for id in all {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRef {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_serializes_camel_case_and_skips_empty() {
        let app = App {
            id: "web-deploy/web".into(),
            cpus: 1.0,
            mem: 256.0,
            instances: 1,
            container: Some(Container::docker(Docker {
                image: "nginx:latest".into(),
                network: NetworkMode::Host,
                port_mappings: vec![PortMapping {
                    container_port: 12345,
                    service_port: Some(10000),
                    ..PortMapping::default()
                }],
                parameters: vec![],
            })),
            health_checks: vec![HealthCheck::default()],
            ..App::default()
        };
        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["container"]["type"], "DOCKER");
        assert_eq!(value["container"]["docker"]["network"], "HOST");
        assert_eq!(
            value["container"]["docker"]["portMappings"][0],
            json!({"containerPort": 12345, "servicePort": 10000})
        );
        assert_eq!(value["healthChecks"][0]["gracePeriodSeconds"], 300);
        assert!(value.get("env").is_none());
        assert!(value.get("tasksUnhealthy").is_none());
    }

    #[test]
    fn external_volume_wire_shape() {
        let volume = ExternalVolume::rexray("path/volume", Some("extdockervolume"), 1);
        assert_eq!(
            serde_json::to_value(&volume).unwrap(),
            json!({
                "containerPath": "path/volume",
                "mode": "RW",
                "external": {
                    "name": "extdockervolume",
                    "provider": "dvdi",
                    "size": 1,
                    "options": {"dvdi/driver": "rexray"}
                }
            })
        );
        assert_eq!(volume.driver(), Some("rexray"));
    }

    #[test]
    fn deployment_actions_accept_type_or_action() {
        let deployments: Vec<Deployment> = serde_json::from_value(json!([
            {"id": "d1", "affectedApps": ["/g/web"], "currentActions": [{"type": "StopApplication"}]},
            {"id": "d2", "affectedApps": ["/g/db"], "currentActions": [{"action": "ScaleApplication", "app": "/g/db"}]}
        ]))
        .unwrap();
        assert!(deployments[0].has_action("StopApplication"));
        assert!(deployments[1].has_action("ScaleApplication"));
        assert!(!deployments[1].has_action("StopApplication"));
    }

    #[test]
    fn deployment_result_collects_both_shapes() {
        let result: DeploymentResult =
            serde_json::from_value(json!({"deploymentId": "a", "version": "v"})).unwrap();
        assert_eq!(result.deployment_ids(), vec!["a"]);

        let result: DeploymentResult =
            serde_json::from_value(json!({"deployments": [{"id": "b"}, {"id": "c"}]})).unwrap();
        assert_eq!(result.deployment_ids(), vec!["b", "c"]);
    }

    #[test]
    fn responses_tolerate_nulls_and_unknown_fields() {
        let response: AppResponse = serde_json::from_value(json!({
            "app": {
                "id": "/g/web",
                "args": null,
                "instances": 2,
                "tasksUnhealthy": 1,
                "versionInfo": {"lastScalingAt": "x"},
                "container": {"type": "DOCKER", "docker": {"image": "i", "network": "USER"}, "volumes": null}
            }
        }))
        .unwrap();
        assert_eq!(response.app.instances, 2);
        assert_eq!(response.app.tasks_unhealthy, Some(1));
        assert_eq!(response.app.docker().map(|d| d.network), Some(NetworkMode::User));

        let tasks: TasksResponse = serde_json::from_value(json!({
            "tasks": [{"id": "t1", "host": "h", "ports": [31000], "state": "TASK_RUNNING",
                       "healthCheckResults": [{"alive": false}]}]
        }))
        .unwrap();
        assert!(tasks.tasks[0].has_failed_health_check());
    }
}
