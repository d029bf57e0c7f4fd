//! Create-operation input evaluation.
//!
//! Inputs are either literals or `get_property` calls. The value lands on
//! the app according to the input name prefix:
//!
//! | Prefix | Destination |
//! |---|---|
//! | `ENV_x` | environment variable `x` |
//! | `OPT_x` | docker parameter `x` |
//! | `ARG_x` | appended to the container args |

use tracing::warn;

use bridge_core::{
    FunctionValue, GET_PROPERTY, NodeTemplate, PropertyValue, REQ_TARGET, RelationshipKind, SELF,
    Topology,
};
use bridge_marathon::{App, Parameter};

use crate::error::{BuildError, BuildResult};
use crate::ports::{PortAllocator, endpoint_key};

/// Host name of the marathon-lb load balancer inside Mesos-DNS.
pub const MARATHON_LB_HOST: &str = "marathon-lb.marathon.mesos";

/// Where an input value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSink {
    Env(String),
    DockerOption(String),
    Arg,
}

impl InputSink {
    pub fn parse(input_name: &str) -> Option<Self> {
        if let Some(name) = input_name.strip_prefix("ENV_") {
            Some(Self::Env(name.to_string()))
        } else if let Some(name) = input_name.strip_prefix("OPT_") {
            Some(Self::DockerOption(name.to_string()))
        } else if input_name.starts_with("ARG_") {
            Some(Self::Arg)
        } else {
            None
        }
    }
}

/// Write a resolved input into the app. Unknown prefixes are dropped.
pub fn apply_input(app: &mut App, input_name: &str, value: String) {
    match InputSink::parse(input_name) {
        Some(InputSink::Env(name)) => {
            app.env.insert(name, value);
        }
        Some(InputSink::DockerOption(name)) => {
            if let Some(container) = app.container.as_mut() {
                container.docker.parameters.push(Parameter { key: name, value });
            }
        }
        Some(InputSink::Arg) => app.args.push(value),
        None => warn!(app_id = %app.id, input = input_name, "unrecognized input prefix, dropping"),
    }
}

/// Evaluates inputs of one node's create operation.
pub struct InputResolver<'a> {
    pub group_id: &'a str,
    pub node: &'a NodeTemplate,
    pub topology: &'a Topology,
    pub ports: &'a PortAllocator,
}

impl InputResolver<'_> {
    /// Resolve an input to a string. `Ok(None)` means the input is dropped.
    pub fn resolve(&self, input_name: &str, value: &PropertyValue) -> BuildResult<Option<String>> {
        match value {
            PropertyValue::Scalar(literal) => Ok(Some(literal.clone())),
            PropertyValue::Function(function) if function.function == GET_PROPERTY => {
                match function.template_name() {
                    Some(REQ_TARGET) => self.resolve_req_target(input_name, function),
                    Some(SELF) => Ok(self.resolve_self(input_name, function)),
                    other => {
                        warn!(node = %self.node.id, input = input_name, target = ?other, "unsupported get_property target, dropping input");
                        Ok(None)
                    }
                }
            }
            PropertyValue::Function(function) => {
                warn!(node = %self.node.id, input = input_name, function = %function.function, "unsupported function, dropping input");
                Ok(None)
            }
            PropertyValue::List(_) | PropertyValue::Complex(_) => {
                warn!(node = %self.node.id, input = input_name, "non-scalar input, dropping");
                Ok(None)
            }
        }
    }

    /// `get_property(SELF, prop)`.
    fn resolve_self(&self, input_name: &str, function: &FunctionValue) -> Option<String> {
        let value = function
            .parameters
            .get(1)
            .and_then(|prop| self.node.scalar(prop))
            .map(str::to_string);
        if value.is_none() {
            warn!(node = %self.node.id, input = input_name, "SELF property not found, dropping input");
        }
        value
    }

    /// `get_property(REQ_TARGET, requirement, prop)`.
    fn resolve_req_target(&self, input_name: &str, function: &FunctionValue) -> BuildResult<Option<String>> {
        let (Some(requirement), Some(property)) = (function.parameters.get(1), function.parameters.get(2)) else {
            warn!(node = %self.node.id, input = input_name, "get_property needs a requirement and a property, dropping input");
            return Ok(None);
        };

        let relationship = self
            .node
            .relationships
            .iter()
            .find(|rel| &rel.requirement_name == requirement)
            .ok_or_else(|| BuildError::UnresolvedReference {
                node: self.node.id.clone(),
                requirement: requirement.clone(),
            })?;

        let target = &relationship.target;
        let capability = &relationship.targeted_capability_name;

        if relationship.kind() == RelationshipKind::ConnectsTo {
            let key = endpoint_key(self.group_id, target, capability);
            if property.eq_ignore_ascii_case("port") {
                if let Some(port) = self.ports.get(&key) {
                    return Ok(Some(port.to_string()));
                }
            } else if property.eq_ignore_ascii_case("ip_address") {
                let host = if self.ports.contains(&key) {
                    MARATHON_LB_HOST.to_string()
                } else {
                    format!("{}.{}.marathon.mesos", target.to_lowercase(), self.group_id)
                };
                return Ok(Some(host));
            }
        }

        let value = self.static_property(target, capability, property);
        if value.is_none() {
            warn!(
                node = %self.node.id,
                input = input_name,
                target = %target,
                capability = %capability,
                property = %property,
                "target property not found, dropping input"
            );
        }
        Ok(value)
    }

    /// Property of the targeted capability, falling back to the target node.
    fn static_property(&self, target: &str, capability: &str, property: &str) -> Option<String> {
        let node = self.topology.node(target)?;
        node.capability(capability)
            .and_then(|cap| cap.scalar(property))
            .or_else(|| node.scalar(property))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{Capability, RelationshipTemplate};
    use bridge_marathon::{Container, Docker};

    use crate::ports::ServicePortCounter;

    fn test_app() -> App {
        App {
            id: "g/web".into(),
            container: Some(Container::docker(Docker::default())),
            ..App::default()
        }
    }

    fn test_topology() -> Topology {
        let src = NodeTemplate::new("Src")
            .with_property("name", PropertyValue::scalar("source"))
            .with_relationship(RelationshipTemplate::connects_to("Tgt", "endpoint_req", "endpoint_cap"));
        let tgt = NodeTemplate::new("Tgt").with_capability(
            Capability::endpoint("endpoint_cap")
                .with_property("port", PropertyValue::scalar("12345"))
                .with_property("opt", PropertyValue::scalar("abcd")),
        );
        Topology {
            non_natives: vec![src, tgt],
            volumes: vec![],
        }
    }

    #[test]
    fn prefixes_route_values() {
        let mut app = test_app();
        apply_input(&mut app, "ENV_HOST", "h".into());
        apply_input(&mut app, "OPT_memory", "1g".into());
        apply_input(&mut app, "ARG_first", "a".into());
        apply_input(&mut app, "OTHER", "dropped".into());

        assert_eq!(app.env["HOST"], "h");
        assert_eq!(app.docker().unwrap().parameters, vec![Parameter::new("memory", "1g")]);
        assert_eq!(app.args, vec!["a"]);
        assert_eq!(app.env.len(), 1);
    }

    #[test]
    fn req_target_port_and_ip_use_service_port() {
        let topology = test_topology();
        let mut ports = PortAllocator::new(ServicePortCounter::default());
        ports.get_or_allocate(&endpoint_key("g", "Tgt", "endpoint_cap"));

        let resolver = InputResolver {
            group_id: "g",
            node: &topology.non_natives[0],
            topology: &topology,
            ports: &ports,
        };
        let port = PropertyValue::get_property(&[REQ_TARGET, "endpoint_req", "port"]);
        let ip = PropertyValue::get_property(&[REQ_TARGET, "endpoint_req", "IP_ADDRESS"]);
        let opt = PropertyValue::get_property(&[REQ_TARGET, "endpoint_req", "opt"]);

        assert_eq!(resolver.resolve("ARG_PORT", &port).unwrap().as_deref(), Some("10000"));
        assert_eq!(resolver.resolve("ENV_IP", &ip).unwrap().as_deref(), Some(MARATHON_LB_HOST));
        assert_eq!(resolver.resolve("OPT_OPT", &opt).unwrap().as_deref(), Some("abcd"));
    }

    #[test]
    fn req_target_without_service_port_falls_back() {
        let topology = test_topology();
        let ports = PortAllocator::new(ServicePortCounter::default());
        let resolver = InputResolver {
            group_id: "g",
            node: &topology.non_natives[0],
            topology: &topology,
            ports: &ports,
        };

        let port = PropertyValue::get_property(&[REQ_TARGET, "endpoint_req", "port"]);
        let ip = PropertyValue::get_property(&[REQ_TARGET, "endpoint_req", "ip_address"]);
        assert_eq!(resolver.resolve("ARG_PORT", &port).unwrap().as_deref(), Some("12345"));
        assert_eq!(
            resolver.resolve("ENV_IP", &ip).unwrap().as_deref(),
            Some("tgt.g.marathon.mesos")
        );
    }

    #[test]
    fn missing_requirement_is_unresolved() {
        let topology = test_topology();
        let ports = PortAllocator::new(ServicePortCounter::default());
        let resolver = InputResolver {
            group_id: "g",
            node: &topology.non_natives[0],
            topology: &topology,
            ports: &ports,
        };

        let value = PropertyValue::get_property(&[REQ_TARGET, "nope", "port"]);
        assert_eq!(
            resolver.resolve("ENV_X", &value),
            Err(BuildError::UnresolvedReference {
                node: "Src".into(),
                requirement: "nope".into()
            })
        );
    }

    #[test]
    fn self_literals_and_unsupported_values() {
        let topology = test_topology();
        let ports = PortAllocator::new(ServicePortCounter::default());
        let resolver = InputResolver {
            group_id: "g",
            node: &topology.non_natives[0],
            topology: &topology,
            ports: &ports,
        };

        let own = PropertyValue::get_property(&[SELF, "name"]);
        assert_eq!(resolver.resolve("ENV_NAME", &own).unwrap().as_deref(), Some("source"));
        assert_eq!(
            resolver.resolve("ENV_LIT", &PropertyValue::scalar("x")).unwrap().as_deref(),
            Some("x")
        );
        assert_eq!(
            resolver
                .resolve("ENV_LIST", &PropertyValue::List(vec!["a".into()]))
                .unwrap(),
            None
        );
        let missing_self = PropertyValue::get_property(&[SELF, "absent"]);
        assert_eq!(resolver.resolve("ENV_ABSENT", &missing_self).unwrap(), None);
    }
}
