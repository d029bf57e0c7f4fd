//! Marathon events → normalized lifecycle events.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use bridge_core::{
    DeploymentStatus, DeploymentStatusEvent, InstanceStateEvent, InstanceStatus, MonitorEvent,
    UNKNOWN_DEPLOYMENT, UNKNOWN_DEPLOYMENT_ID, UNKNOWN_NODE, translate_task_status,
};
use bridge_mapping::{DeploymentIntent, MappingRegistry};
use bridge_marathon::MarathonEvent;
use bridge_marathon::events::{
    DeploymentInfoEvent, DeploymentOutcomeEvent, HealthStatusChangedEvent, StatusUpdateEvent,
};

/// Correlates Marathon ids with topology ids through the mapping registry.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    registry: MappingRegistry,
}

impl EventNormalizer {
    pub fn new(registry: MappingRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Decode and normalize one SSE frame.
    ///
    /// Malformed bodies and unsubscribed event names are dropped.
    pub fn handle_raw(&self, name: &str, data: &str) -> Option<MonitorEvent> {
        debug!(event = name, "marathon event received");
        match MarathonEvent::decode(name, data) {
            Ok(Some(event)) => self.normalize(&event),
            Ok(None) => {
                debug!(event = name, "ignoring unsubscribed marathon event");
                None
            }
            Err(e) => {
                warn!(event = name, error = %e, "dropping malformed marathon event");
                None
            }
        }
    }

    /// Normalize a decoded event; `None` for acknowledged-only events.
    pub fn normalize(&self, event: &MarathonEvent) -> Option<MonitorEvent> {
        let date = parse_timestamp(event.timestamp());
        let normalized: MonitorEvent = match event {
            MarathonEvent::DeploymentInfo(e) => self.deployment_info(date, e).into(),
            MarathonEvent::DeploymentSuccess(e) => self.deployment_success(date, e).into(),
            MarathonEvent::DeploymentFailed(e) => self.deployment_failed(date, e).into(),
            MarathonEvent::StatusUpdate(e) => self.status_update(date, e).into(),
            MarathonEvent::HealthStatusChanged(e) => self.health_changed(date, e).into(),
            MarathonEvent::UnhealthyTaskKill(e) => {
                debug!(app_id = %e.app_id, task_id = %e.task_id, "unhealthy task killed");
                return None;
            }
        };
        Some(normalized)
    }

    // ── Deployments ───────────────────────────────────────────────

    fn deployment_info(&self, date: i64, event: &DeploymentInfoEvent) -> DeploymentStatusEvent {
        match self.registry.lookup_deployment_intent(&event.plan.id) {
            Some(mapping) => DeploymentStatusEvent::progress(
                date,
                mapping.topology_deployment_id,
                mapping.intent.in_progress_status(),
            ),
            None => DeploymentStatusEvent::progress(date, UNKNOWN_DEPLOYMENT_ID, DeploymentStatus::Unknown),
        }
    }

    fn deployment_success(&self, date: i64, event: &DeploymentOutcomeEvent) -> DeploymentStatusEvent {
        let Some(mapping) = self.registry.take_deployment_intent(&event.id) else {
            return unknown_deployment(date, DeploymentStatus::Unknown);
        };

        if mapping.intent == DeploymentIntent::Undeploying {
            if let Some(group_id) = &mapping.group_id {
                self.registry.remove_group_mapping(group_id);
            }
        }

        DeploymentStatusEvent::outcome(date, mapping.topology_deployment_id, mapping.intent.success_status())
    }

    fn deployment_failed(&self, date: i64, event: &DeploymentOutcomeEvent) -> DeploymentStatusEvent {
        match self.registry.take_deployment_intent(&event.id) {
            Some(mapping) => {
                DeploymentStatusEvent::outcome(date, mapping.topology_deployment_id, DeploymentStatus::Failure)
            }
            None => unknown_deployment(date, DeploymentStatus::Failure),
        }
    }

    // ── Instances ─────────────────────────────────────────────────

    fn status_update(&self, date: i64, event: &StatusUpdateEvent) -> InstanceStateEvent {
        let (deployment_id, node_template_id) = self.resolve_app(&event.app_id);
        let (state, status) = translate_task_status(&event.task_status);
        InstanceStateEvent {
            date,
            deployment_id,
            node_template_id,
            instance_id: event.task_id.clone(),
            instance_state: Some(state),
            instance_status: status,
        }
    }

    fn health_changed(&self, date: i64, event: &HealthStatusChangedEvent) -> InstanceStateEvent {
        let (deployment_id, node_template_id) = self.resolve_app(&event.app_id);
        let (instance_state, instance_status) = if event.alive {
            (Some("started".to_string()), InstanceStatus::Success)
        } else {
            (None, InstanceStatus::Failure)
        };
        InstanceStateEvent {
            date,
            deployment_id,
            node_template_id,
            instance_id: event.task_id.clone(),
            instance_state,
            instance_status,
        }
    }

    /// `/<group>/<node>` → `(topology deployment id, node template id)`.
    fn resolve_app(&self, app_id: &str) -> (String, String) {
        let trimmed = app_id.trim_matches('/');
        let Some((group_id, local_id)) = trimmed.rsplit_once('/') else {
            return (UNKNOWN_DEPLOYMENT.to_string(), UNKNOWN_NODE.to_string());
        };

        if let Some(found) = self.registry.node_template_for(group_id, local_id) {
            return found;
        }
        match self.registry.lookup_group_mapping(group_id) {
            Some(group) => (group.topology_deployment_id, UNKNOWN_NODE.to_string()),
            None => (UNKNOWN_DEPLOYMENT.to_string(), UNKNOWN_NODE.to_string()),
        }
    }
}

fn unknown_deployment(date: i64, status: DeploymentStatus) -> DeploymentStatusEvent {
    DeploymentStatusEvent::outcome(date, UNKNOWN_DEPLOYMENT_ID, status)
}

/// Milliseconds since the epoch; now-time when the timestamp is unparsable.
fn parse_timestamp(timestamp: &str) -> i64 {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed.timestamp_millis(),
        Err(e) => {
            warn!(timestamp, error = %e, "unparsable event timestamp, using current time");
            Utc::now().timestamp_millis()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(MappingRegistry::new())
    }

    fn deployment(event: Option<MonitorEvent>) -> DeploymentStatusEvent {
        match event {
            Some(MonitorEvent::DeploymentStatus(e)) => e,
            other => panic!("expected deployment event, got {other:?}"),
        }
    }

    fn instance(event: Option<MonitorEvent>) -> InstanceStateEvent {
        match event {
            Some(MonitorEvent::InstanceState(e)) => e,
            other => panic!("expected instance event, got {other:?}"),
        }
    }

    #[test]
    fn success_after_deploy_maps_and_removes_intent() {
        let normalizer = normalizer();
        normalizer.registry().register_deployment_intent(
            "mdep-1",
            "alien-1",
            DeploymentIntent::Deploying,
            Some("grp"),
        );

        let event = deployment(normalizer.handle_raw(
            "deployment_success",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","id":"mdep-1"}"#,
        ));
        assert_eq!(
            event,
            DeploymentStatusEvent::outcome(1_393_716_570_158, "alien-1", DeploymentStatus::Deployed)
        );
        assert!(normalizer.registry().take_deployment_intent("mdep-1").is_none());
    }

    #[test]
    fn info_keeps_intent_and_reports_progress() {
        let normalizer = normalizer();
        normalizer.registry().register_deployment_intent(
            "mdep-2",
            "alien-2",
            DeploymentIntent::Undeploying,
            None,
        );

        let event = deployment(normalizer.handle_raw(
            "deployment_info",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","plan":{"id":"mdep-2"}}"#,
        ));
        assert_eq!(event.status, DeploymentStatus::UndeploymentInProgress);
        assert_eq!(event.deployment_id, "alien-2");
        assert!(event.progress);
        assert!(normalizer.registry().lookup_deployment_intent("mdep-2").is_some());
    }

    #[test]
    fn undeploy_success_removes_group_mapping() {
        let normalizer = normalizer();
        let registry = normalizer.registry();
        registry.register_group_mapping("grp", "alien-3");
        registry.register_deployment_intent(
            "mdep-3",
            "alien-3",
            DeploymentIntent::Undeploying,
            Some("grp"),
        );

        let event = deployment(normalizer.handle_raw(
            "deployment_success",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","id":"mdep-3"}"#,
        ));
        assert_eq!(event.status, DeploymentStatus::Undeployed);
        assert!(registry.lookup_group_mapping("grp").is_none());
    }

    #[test]
    fn unmapped_deployments_are_reported_not_dropped() {
        let normalizer = normalizer();

        let success = deployment(normalizer.handle_raw(
            "deployment_success",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","id":"nope"}"#,
        ));
        assert_eq!(success.deployment_id, UNKNOWN_DEPLOYMENT_ID);
        assert_eq!(success.status, DeploymentStatus::Unknown);

        let failed = deployment(normalizer.handle_raw(
            "deployment_failed",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","id":"nope"}"#,
        ));
        assert_eq!(failed.deployment_id, UNKNOWN_DEPLOYMENT_ID);
        assert_eq!(failed.status, DeploymentStatus::Failure);
        assert!(!failed.progress);

        let info = deployment(normalizer.handle_raw(
            "deployment_info",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","plan":{"id":"nope"}}"#,
        ));
        assert_eq!(info.deployment_id, UNKNOWN_DEPLOYMENT_ID);
        assert_eq!(info.status, DeploymentStatus::Unknown);
        assert!(info.progress);
    }

    #[test]
    fn failed_deploy_reports_failure_and_removes_intent() {
        let normalizer = normalizer();
        normalizer.registry().register_deployment_intent(
            "mdep-4",
            "alien-4",
            DeploymentIntent::Deploying,
            None,
        );
        let event = deployment(normalizer.handle_raw(
            "deployment_failed",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","id":"mdep-4"}"#,
        ));
        assert_eq!(event.deployment_id, "alien-4");
        assert_eq!(event.status, DeploymentStatus::Failure);
        assert_eq!(normalizer.registry().pending_deployment_count(), 0);
    }

    #[test]
    fn status_update_resolves_node_and_translates_status() {
        let normalizer = normalizer();
        normalizer.registry().register_group_mapping("grp", "alien-5");
        normalizer.registry().register_app_mapping("grp", "grp/web", "Web");

        let event = instance(normalizer.handle_raw(
            "status_update_event",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/web","taskId":"web.1",
                "taskStatus":"TASK_RUNNING","slaveId":"s1","host":"10.0.0.1"}"#,
        ));
        assert_eq!(event.deployment_id, "alien-5");
        assert_eq!(event.node_template_id, "Web");
        assert_eq!(event.instance_id, "web.1");
        assert_eq!(event.instance_state.as_deref(), Some("started"));
        assert_eq!(event.instance_status, InstanceStatus::Success);
    }

    #[test]
    fn unknown_task_status_keeps_raw_name() {
        let normalizer = normalizer();
        let event = instance(normalizer.handle_raw(
            "status_update_event",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/web","taskId":"t",
                "taskStatus":"TASK_DROPPED"}"#,
        ));
        assert_eq!(event.instance_state.as_deref(), Some("TASK_DROPPED"));
        assert_eq!(event.instance_status, InstanceStatus::Processing);
        assert_eq!(event.deployment_id, UNKNOWN_DEPLOYMENT);
        assert_eq!(event.node_template_id, UNKNOWN_NODE);
    }

    #[test]
    fn known_group_with_unknown_app_keeps_deployment_id() {
        let normalizer = normalizer();
        normalizer.registry().register_group_mapping("grp", "alien-6");
        let event = instance(normalizer.handle_raw(
            "status_update_event",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/db","taskId":"t",
                "taskStatus":"TASK_KILLED"}"#,
        ));
        assert_eq!(event.deployment_id, "alien-6");
        assert_eq!(event.node_template_id, UNKNOWN_NODE);
        assert_eq!(event.instance_status, InstanceStatus::Maintenance);
    }

    #[test]
    fn health_changes_map_alive_flag() {
        let normalizer = normalizer();
        normalizer.registry().register_group_mapping("grp", "alien-7");
        normalizer.registry().register_app_mapping("grp", "web", "Web");

        let alive = instance(normalizer.handle_raw(
            "health_status_changed_event",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/web","taskId":"t","alive":true}"#,
        ));
        assert_eq!(alive.instance_state.as_deref(), Some("started"));
        assert_eq!(alive.instance_status, InstanceStatus::Success);

        let dead = instance(normalizer.handle_raw(
            "health_status_changed_event",
            r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/web","taskId":"t","alive":false}"#,
        ));
        assert_eq!(dead.instance_state, None);
        assert_eq!(dead.instance_status, InstanceStatus::Failure);
        assert_eq!(dead.node_template_id, "Web");
    }

    #[test]
    fn bad_timestamp_falls_back_to_now() {
        let before = Utc::now().timestamp_millis();
        let event = deployment(normalizer().handle_raw(
            "deployment_failed",
            r#"{"timestamp":"yesterday","id":"x"}"#,
        ));
        assert!(event.date >= before);
    }

    #[test]
    fn malformed_unsubscribed_and_acknowledged_events_are_dropped() {
        let normalizer = normalizer();
        assert!(normalizer.handle_raw("deployment_success", "{not json").is_none());
        assert!(normalizer.handle_raw("framework_message_event", "{}").is_none());
        assert!(
            normalizer
                .handle_raw(
                    "unhealthy_task_kill_event",
                    r#"{"timestamp":"2014-03-01T23:29:30.158Z","appId":"/grp/web","taskId":"t"}"#,
                )
                .is_none()
        );
    }
}
