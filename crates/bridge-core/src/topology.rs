//! Topology input model.
//!
//! The host hands the bridge a TOSCA-style graph: *non-native* nodes that
//! become Marathon apps, and *volume* nodes that declare external
//! persistent volumes. Relationships are directed edges owned by their
//! source node. The model is read-only for the bridge; it is only ever
//! walked, never mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Relationship type linking a consumer to a provider endpoint.
pub const CONNECTS_TO: &str = "tosca.relationships.ConnectsTo";

/// Relationship type mounting a volume node into a consumer container.
pub const MOUNT_DOCKER_VOLUME: &str = "alien.relationships.MountDockerVolume";

/// Function target keyword: the node targeted by one of my requirements.
pub const REQ_TARGET: &str = "REQ_TARGET";

/// Function target keyword: the node owning the operation.
pub const SELF: &str = "SELF";

/// Name of the only function the builder evaluates.
pub const GET_PROPERTY: &str = "get_property";

/// Everything the host knows about one topology deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentContext {
    /// Stable host-side deployment id, reported back in normalized events.
    pub deployment_id: String,
    /// Orchestrator-facing deployment name; lowercased into the group id.
    pub deployment_paas_id: String,
    pub topology: Topology,
}

impl DeploymentContext {
    pub fn new(deployment_id: &str, deployment_paas_id: &str, topology: Topology) -> Self {
        Self {
            deployment_id: deployment_id.to_string(),
            deployment_paas_id: deployment_paas_id.to_string(),
            topology,
        }
    }

    /// Marathon group id for this deployment.
    pub fn group_id(&self) -> String {
        self.deployment_paas_id.to_lowercase()
    }
}

/// The node lists of a deployed topology, in declared order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    #[serde(default)]
    pub non_natives: Vec<NodeTemplate>,
    #[serde(default)]
    pub volumes: Vec<NodeTemplate>,
}

impl Topology {
    /// Find a node (non-native or volume) by its template id.
    pub fn node(&self, id: &str) -> Option<&NodeTemplate> {
        self.non_natives
            .iter()
            .chain(self.volumes.iter())
            .find(|node| node.id == id)
    }
}

/// A node template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeTemplate {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Capabilities in declared order.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Relationships this node is the source of, in declared order.
    #[serde(default)]
    pub relationships: Vec<RelationshipTemplate>,
    /// The `create` operation of the standard lifecycle interface.
    #[serde(default)]
    pub create: Option<Operation>,
    #[serde(default)]
    pub scaling_policy: Option<ScalingPolicy>,
}

impl NodeTemplate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, node_type: &str) -> Self {
        self.node_type = node_type.to_string();
        self
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipTemplate) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Set the `create` operation with a Docker image artifact.
    pub fn with_image(mut self, image: &str) -> Self {
        let create = self.create.get_or_insert_with(Operation::default);
        create.implementation_artifact = Some(ImplementationArtifact {
            artifact_ref: image.to_string(),
            artifact_type: Some("tosca.artifacts.Deployment.Image.Container.Docker".to_string()),
        });
        self
    }

    /// Add an input parameter to the `create` operation.
    pub fn with_input(mut self, name: &str, value: PropertyValue) -> Self {
        self.create
            .get_or_insert_with(Operation::default)
            .inputs
            .insert(name.to_string(), value);
        self
    }

    pub fn with_initial_instances(mut self, initial: u32) -> Self {
        self.scaling_policy = Some(ScalingPolicy {
            min_instances: 1,
            max_instances: initial.max(1),
            initial_instances: initial,
        });
        self
    }

    /// Scalar property value, if present and scalar.
    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_scalar)
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|cap| cap.name == name)
    }

    /// Initial instance count from the scaling policy (1 when absent).
    pub fn initial_instances(&self) -> u32 {
        self.scaling_policy
            .as_ref()
            .map(|policy| policy.initial_instances)
            .unwrap_or(1)
    }
}

/// Instance-count constraints of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingPolicy {
    pub min_instances: u32,
    pub max_instances: u32,
    pub initial_instances: u32,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 1,
            initial_instances: 1,
        }
    }
}

/// A capability offered by a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    pub name: String,
    #[serde(rename = "type")]
    pub capability_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Capability {
    /// An endpoint capability (`tosca.capabilities.Endpoint` and derived).
    pub fn endpoint(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capability_type: "tosca.capabilities.Endpoint".to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn is_endpoint(&self) -> bool {
        self.capability_type
            .to_ascii_lowercase()
            .contains("capabilities.endpoint")
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_scalar)
    }
}

/// Relationship kinds the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    ConnectsTo,
    MountDockerVolume,
    Other,
}

/// A directed relationship owned by its source node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelationshipTemplate {
    pub id: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Target node template id.
    pub target: String,
    /// Requirement of the source this relationship fulfills.
    #[serde(default)]
    pub requirement_name: String,
    /// Capability of the target this relationship points at.
    #[serde(default)]
    pub targeted_capability_name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl RelationshipTemplate {
    /// A `connectsTo` edge to `target` via `capability`, fulfilling `requirement`.
    pub fn connects_to(target: &str, requirement: &str, capability: &str) -> Self {
        Self {
            id: format!("connects-{requirement}-{target}"),
            relationship_type: CONNECTS_TO.to_string(),
            target: target.to_string(),
            requirement_name: requirement.to_string(),
            targeted_capability_name: capability.to_string(),
            properties: BTreeMap::new(),
        }
    }

    /// A `mountDockerVolume` edge from a volume to the consumer `target`.
    pub fn mount_volume(target: &str, container_path: Option<&str>) -> Self {
        let mut properties = BTreeMap::new();
        if let Some(path) = container_path {
            properties.insert("container_path".to_string(), PropertyValue::scalar(path));
        }
        Self {
            id: format!("mount-{target}"),
            relationship_type: MOUNT_DOCKER_VOLUME.to_string(),
            target: target.to_string(),
            requirement_name: "attachment".to_string(),
            targeted_capability_name: "attach".to_string(),
            properties,
        }
    }

    pub fn kind(&self) -> RelationshipKind {
        if self.relationship_type.eq_ignore_ascii_case(CONNECTS_TO) {
            RelationshipKind::ConnectsTo
        } else if self
            .relationship_type
            .eq_ignore_ascii_case(MOUNT_DOCKER_VOLUME)
        {
            RelationshipKind::MountDockerVolume
        } else {
            RelationshipKind::Other
        }
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_scalar)
    }
}

/// A lifecycle operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    #[serde(default)]
    pub implementation_artifact: Option<ImplementationArtifact>,
    /// Input parameters, keyed by name (ordered).
    #[serde(default)]
    pub inputs: BTreeMap<String, PropertyValue>,
}

/// The artifact implementing an operation; for containers, an image reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImplementationArtifact {
    pub artifact_ref: String,
    #[serde(default)]
    pub artifact_type: Option<String>,
}

/// A property or input value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Function(FunctionValue),
    Scalar(String),
    List(Vec<String>),
    Complex(BTreeMap<String, String>),
}

impl PropertyValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// `get_property(params...)`.
    pub fn get_property(parameters: &[&str]) -> Self {
        Self::Function(FunctionValue {
            function: GET_PROPERTY.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// A TOSCA function call such as `get_property: [REQ_TARGET, req, prop]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionValue {
    pub function: String,
    pub parameters: Vec<String>,
}

impl FunctionValue {
    /// First parameter: `SELF`, `REQ_TARGET`, or a node name.
    pub fn template_name(&self) -> Option<&str> {
        self.parameters.first().map(String::as_str)
    }
}
