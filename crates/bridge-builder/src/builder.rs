//! Topology → Marathon group builder.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use bridge_core::{
    Capability, DeploymentContext, NodeTemplate, PropertyValue, RelationshipKind,
    RelationshipTemplate, Topology,
};
use bridge_mapping::MappingRegistry;
use bridge_marathon::{
    App, Container, Docker, ExternalVolume, Group, HAPROXY_GROUP_LABEL, HealthCheck, NetworkMode,
    Parameter, PortMapping,
};

use crate::error::{BuildError, BuildResult};
use crate::inputs::{InputResolver, apply_input};
use crate::ports::{PortAllocator, ServicePortCounter, endpoint_key};

pub const DEFAULT_CPU_SHARE: f64 = 1.0;
pub const DEFAULT_MEM_SHARE: f64 = 256.0;
pub const DEFAULT_VOLUME_SIZE_GB: u32 = 1;

/// Suffix the artifact resolver leaves on Docker image references.
const DOCKER_IMAGE_SUFFIX: &str = ".dockerimg";

/// Marathon's rule for one `/`-separated id segment.
static ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([a-z0-9]|[a-z0-9][a-z0-9\-]*[a-z0-9])\.)*([a-z0-9]|[a-z0-9][a-z0-9\-]*[a-z0-9])$")
        .expect("valid id segment regex")
});

static VOLUME_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-9][0-9]*)\s(GiB|GB)$").expect("valid volume size regex"));

/// Builds Marathon groups and records their mappings.
///
/// Cheap to clone; clones share the registry and the service port counter.
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    registry: MappingRegistry,
    counter: ServicePortCounter,
}

impl TopologyBuilder {
    pub fn new(registry: MappingRegistry, counter: ServicePortCounter) -> Self {
        Self { registry, counter }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn counter(&self) -> &ServicePortCounter {
        &self.counter
    }

    /// Build the group for `ctx` with a fresh endpoint table.
    pub fn build_group(&self, ctx: &DeploymentContext) -> BuildResult<Group> {
        let mut ports = PortAllocator::new(self.counter.clone());
        self.build_group_with(ctx, &mut ports)
    }

    /// Build the group using `ports`; the table is empty again on return.
    pub fn build_group_with(&self, ctx: &DeploymentContext, ports: &mut PortAllocator) -> BuildResult<Group> {
        let result = self.build(ctx, ports);
        ports.clear();
        result
    }

    fn build(&self, ctx: &DeploymentContext, ports: &mut PortAllocator) -> BuildResult<Group> {
        let group_id = ctx.group_id();
        let topology = &ctx.topology;

        // App ids are lowercased node ids; two nodes must not collapse into one.
        let mut seen = HashSet::new();
        for node in &topology.non_natives {
            let app_id = format!("{group_id}/{}", node.id.to_lowercase());
            if !seen.insert(app_id.clone()) {
                return Err(BuildError::Validation { app_id });
            }
        }

        // Reserve target endpoints first so every consumer and the provider
        // agree on the same service port whatever the node order.
        for node in &topology.non_natives {
            for rel in connects_to(node) {
                let key = endpoint_key(&group_id, &rel.target, &rel.targeted_capability_name);
                if !ports.contains(&key) {
                    let port = ports.allocate();
                    ports.assign(&key, port);
                }
            }
        }

        let mut group = Group::new(&group_id);
        let mut app_nodes = Vec::with_capacity(topology.non_natives.len());
        for node in &topology.non_natives {
            let volumes = attached_volumes(topology, &node.id);
            let app = build_app(&group_id, node, topology, &volumes, ports)?;
            debug!(
                app_id = %app.id,
                instances = app.instances,
                ports = app.docker().map(|d| d.port_mappings.len()).unwrap_or(0),
                "built marathon app"
            );
            app_nodes.push((app.id.clone(), node.id.as_str()));
            group.apps.push(app);
        }

        // Only a complete build replaces the group's mapping.
        self.registry
            .register_group_mapping(&group_id, &ctx.deployment_id);
        for (app_id, node_id) in &app_nodes {
            self.registry.register_app_mapping(&group_id, app_id, node_id);
        }

        info!(group_id = %group.id, apps = group.apps.len(), "built marathon group");
        Ok(group)
    }
}

fn build_app(
    group_id: &str,
    node: &NodeTemplate,
    topology: &Topology,
    volumes: &[(&NodeTemplate, &RelationshipTemplate)],
    ports: &mut PortAllocator,
) -> BuildResult<App> {
    let app_id = format!("{group_id}/{}", node.id.to_lowercase());
    validate_app_id(&app_id)?;

    let image = node
        .create
        .as_ref()
        .and_then(|op| op.implementation_artifact.as_ref())
        .map(|artifact| docker_image(&artifact.artifact_ref))
        .filter(|image| !image.is_empty())
        .ok_or_else(|| BuildError::Config("create operation must specify image".to_string()))?;

    let mut app = App {
        id: app_id,
        cpus: share(node, "cpu_share", DEFAULT_CPU_SHARE)?,
        mem: share(node, "mem_share", DEFAULT_MEM_SHARE)?,
        instances: node.initial_instances(),
        container: Some(Container::docker(Docker {
            image: image.to_string(),
            ..Docker::default()
        })),
        ..App::default()
    };

    apply_user_properties(&mut app, node);
    apply_endpoints(&mut app, group_id, node, ports)?;

    for rel in connects_to(node) {
        let dependency = rel.target.to_lowercase();
        if !app.dependencies.contains(&dependency) {
            app.dependencies.push(dependency);
        }
    }

    if let Some(create) = &node.create {
        let resolver = InputResolver {
            group_id,
            node,
            topology,
            ports,
        };
        for (name, value) in &create.inputs {
            if let Some(resolved) = resolver.resolve(name, value)? {
                apply_input(&mut app, name, resolved);
            }
        }
    }

    apply_volumes(&mut app, volumes)?;

    let health_check = match node.properties.get("docker_health_check") {
        Some(PropertyValue::Complex(fields)) => declared_health_check(&node.id, fields)?,
        _ => HealthCheck::default(),
    };
    app.health_checks.push(health_check);

    Ok(app)
}

/// cmd, args, env vars and docker options declared as node properties.
fn apply_user_properties(app: &mut App, node: &NodeTemplate) {
    if let Some(cmd) = node.scalar("docker_run_cmd") {
        app.cmd = Some(cmd.to_string());
    }
    if let Some(PropertyValue::List(args)) = node.properties.get("docker_run_args") {
        app.args.extend(args.iter().cloned());
    }
    if let Some(PropertyValue::Complex(vars)) = node.properties.get("docker_env_vars") {
        app.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let (Some(PropertyValue::Complex(options)), Some(container)) =
        (node.properties.get("docker_options"), app.container.as_mut())
    {
        container
            .docker
            .parameters
            .extend(options.iter().map(|(k, v)| Parameter::new(k, v)));
    }
}

/// One port mapping per endpoint capability.
fn apply_endpoints(
    app: &mut App,
    group_id: &str,
    node: &NodeTemplate,
    ports: &mut PortAllocator,
) -> BuildResult<()> {
    let Some(container) = app.container.as_mut() else {
        return Ok(());
    };
    let docker = &mut container.docker;
    let mut bridged = false;

    for capability in node.capabilities.iter().filter(|cap| cap.is_endpoint()) {
        let key = endpoint_key(group_id, &node.id, &capability.name);
        let mut mapping = PortMapping {
            container_port: port_property(capability, "port")?.unwrap_or(0),
            service_port: Some(ports.get_or_allocate(&key)),
            ..PortMapping::default()
        };

        if capability.properties.contains_key("docker_bridge_port_mapping") {
            bridged = true;
            mapping.host_port = Some(port_property(capability, "docker_bridge_port_mapping")?.unwrap_or(0));
            mapping.protocol = Some("tcp".to_string());
        }

        docker.port_mappings.push(mapping);
        app.labels
            .insert(HAPROXY_GROUP_LABEL.to_string(), "internal".to_string());
    }

    docker.network = if bridged {
        NetworkMode::Bridge
    } else {
        NetworkMode::Host
    };
    Ok(())
}

fn apply_volumes(app: &mut App, volumes: &[(&NodeTemplate, &RelationshipTemplate)]) -> BuildResult<()> {
    if volumes.is_empty() {
        return Ok(());
    }
    let Some(container) = app.container.as_mut() else {
        return Ok(());
    };

    for (volume, mount) in volumes {
        let container_path = mount.scalar("container_path").ok_or_else(|| {
            BuildError::Config(format!(
                "a container path must be provided to mount volume {} into {}",
                volume.id, app.id
            ))
        })?;
        let size = volume
            .scalar("size")
            .and_then(volume_size_gb)
            .unwrap_or(DEFAULT_VOLUME_SIZE_GB);
        container.volumes.push(ExternalVolume::rexray(
            container_path,
            volume.scalar("volume_name"),
            size,
        ));
    }

    // External volumes cannot be shared between instances.
    app.instances = 1;
    Ok(())
}

fn declared_health_check(
    node_id: &str,
    fields: &std::collections::BTreeMap<String, String>,
) -> BuildResult<HealthCheck> {
    let defaults = HealthCheck::default();
    let number = |name: &str, default: u32| -> BuildResult<u32> {
        match fields.get(name) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                BuildError::Config(format!("docker_health_check.{name} of {node_id} is not a number: {raw}"))
            }),
            None => Ok(default),
        }
    };

    Ok(HealthCheck {
        protocol: fields
            .get("protocol")
            .map(|p| p.to_uppercase())
            .unwrap_or(defaults.protocol),
        port_index: Some(number("port_index", defaults.port_index.unwrap_or(0))?),
        path: fields.get("path").cloned(),
        grace_period_seconds: number("grace_period_seconds", defaults.grace_period_seconds)?,
        interval_seconds: number("interval_seconds", defaults.interval_seconds)?,
        max_consecutive_failures: number("max_consecutive_failures", defaults.max_consecutive_failures)?,
    })
}

/// Outgoing `connectsTo` relationships of a node.
fn connects_to(node: &NodeTemplate) -> impl Iterator<Item = &RelationshipTemplate> {
    node.relationships
        .iter()
        .filter(|rel| rel.kind() == RelationshipKind::ConnectsTo)
}

/// Volumes whose `mountDockerVolume` edge targets `node_id`.
fn attached_volumes<'a>(
    topology: &'a Topology,
    node_id: &str,
) -> Vec<(&'a NodeTemplate, &'a RelationshipTemplate)> {
    topology
        .volumes
        .iter()
        .filter_map(|volume| {
            volume
                .relationships
                .iter()
                .find(|rel| rel.kind() == RelationshipKind::MountDockerVolume)
                .filter(|rel| rel.target == node_id)
                .map(|rel| (volume, rel))
        })
        .collect()
}

fn validate_app_id(app_id: &str) -> BuildResult<()> {
    if app_id.split('/').all(|segment| ID_SEGMENT.is_match(segment)) {
        Ok(())
    } else {
        Err(BuildError::Validation {
            app_id: app_id.to_string(),
        })
    }
}

fn docker_image(artifact_ref: &str) -> &str {
    let image = artifact_ref.trim();
    image.strip_suffix(DOCKER_IMAGE_SUFFIX).unwrap_or(image)
}

fn share(node: &NodeTemplate, property: &str, default: f64) -> BuildResult<f64> {
    match node.scalar(property) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            BuildError::Config(format!("{property} of {} is not a number: {raw}", node.id))
        }),
        None => Ok(default),
    }
}

fn port_property(capability: &Capability, property: &str) -> BuildResult<Option<u32>> {
    match capability.scalar(property) {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            BuildError::Config(format!(
                "{property} of capability {} is not a port: {raw}",
                capability.name
            ))
        }),
        None => Ok(None),
    }
}

/// `"<n> GB"` / `"<n> GiB"` → n.
fn volume_size_gb(raw: &str) -> Option<u32> {
    VOLUME_SIZE
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse().ok())
}
