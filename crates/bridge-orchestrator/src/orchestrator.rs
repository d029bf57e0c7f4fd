//! The host-facing orchestrator.
//!
//! One `MarathonOrchestrator` per configured plugin instance. It owns the
//! Marathon client, the mapping registry shared by the builder and the
//! event normalizer, the event queue, and the background event subscriber.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use bridge_builder::{ServicePortCounter, TopologyBuilder};
use bridge_core::{BridgeConfig, DeploymentContext, DeploymentStatus, MonitorEvent};
use bridge_events::{EventNormalizer, EventPipeline, EventQueue, EventSubscriber, ReconnectBackoff};
use bridge_mapping::{DeploymentIntent, MappingRegistry};
use bridge_marathon::{AppUpdate, DeploymentResult, MarathonClient, RetryPolicy, retry_read};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::instances::{InstancesInformation, instances_information};
use crate::status::deployment_status;

/// Per-location-type configuration UI; Marathon contributes none.
pub trait LocationConfigurator: Send + Sync {
    fn location_type(&self) -> &str;
}

pub struct MarathonOrchestrator {
    config: BridgeConfig,
    client: MarathonClient,
    registry: MappingRegistry,
    builder: TopologyBuilder,
    queue: EventQueue,
    retry: RetryPolicy,
    subscriber: Option<EventSubscriber>,
}

impl MarathonOrchestrator {
    /// Wire every component from `config`. No I/O happens until `init`.
    pub fn new(config: BridgeConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let client = MarathonClient::from_config(&config)?;
        let registry = MappingRegistry::new();
        let builder = TopologyBuilder::new(
            registry.clone(),
            ServicePortCounter::starting_at(config.service_port_floor),
        );

        Ok(Self {
            client,
            builder,
            queue: EventQueue::new(config.event_queue_capacity),
            retry: RetryPolicy::new(config.read_retry_attempts),
            registry,
            subscriber: None,
            config,
        })
    }

    /// Point the orchestrator at a new Marathon.
    ///
    /// The service-port counter and the mapping registry are kept. A running
    /// subscriber is stopped; call [`init`](Self::init) to resubscribe.
    pub fn set_configuration(&mut self, config: BridgeConfig) -> OrchestratorResult<()> {
        config.validate()?;
        self.client = MarathonClient::from_config(&config)?;
        self.retry = RetryPolicy::new(config.read_retry_attempts);
        self.subscriber = None;
        info!(marathon_url = %config.base_url(), "marathon configuration updated");
        self.config = config;
        Ok(())
    }

    /// Rebuild group mappings for `active` deployments and start the
    /// event subscriber on the current Tokio runtime.
    pub async fn init(&mut self, active: &[DeploymentContext]) {
        self.registry.rehydrate(active);

        let pipeline = EventPipeline::new(EventNormalizer::new(self.registry.clone()), self.queue.clone());
        let backoff = ReconnectBackoff::new(self.config.reconnect_initial(), self.config.reconnect_max());
        self.subscriber = Some(EventSubscriber::subscribe(self.client.clone(), pipeline, backoff));

        info!(active = active.len(), "marathon orchestrator initialized");
    }

    /// Stop the event subscriber.
    pub async fn close(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.close().await;
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Build and post the group. Returns the Marathon deployment ids.
    pub async fn deploy(&self, ctx: &DeploymentContext) -> OrchestratorResult<Vec<String>> {
        let group = self.builder.build_group(ctx)?;
        let result = self.client.create_group(&group).await?;
        let ids = self.register_intents(&result, ctx, DeploymentIntent::Deploying)?;
        info!(
            deployment_id = %ctx.deployment_id,
            group_id = %group.id,
            apps = group.apps.len(),
            marathon_deployments = ?ids,
            "deploy submitted"
        );
        Ok(ids)
    }

    /// Delete the group. A group Marathon no longer knows is already gone.
    pub async fn undeploy(&self, ctx: &DeploymentContext) -> OrchestratorResult<Vec<String>> {
        let group_id = ctx.group_id();
        let result = match self.client.delete_group(&group_id).await {
            Ok(result) => result,
            Err(e) if e.is_not_found() => {
                info!(deployment_id = %ctx.deployment_id, %group_id, "group already absent");
                self.registry.remove_group_mapping(&group_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let ids = self.register_intents(&result, ctx, DeploymentIntent::Undeploying)?;
        info!(
            deployment_id = %ctx.deployment_id,
            %group_id,
            marathon_deployments = ?ids,
            "undeploy submitted"
        );
        Ok(ids)
    }

    /// Change a node's instance count by `delta`, clamped at zero.
    pub async fn scale(
        &self,
        ctx: &DeploymentContext,
        node_id: &str,
        delta: i32,
    ) -> OrchestratorResult<Vec<String>> {
        let app_id = format!("{}/{}", ctx.group_id(), node_id.to_lowercase());
        let app = retry_read(&self.retry, "get app", || self.client.get_app(&app_id)).await?;

        let instances = (i64::from(app.instances) + i64::from(delta)).max(0);
        let instances = u32::try_from(instances).unwrap_or(u32::MAX);
        let result = self
            .client
            .update_app(&app_id, &AppUpdate { instances })
            .await?;

        let ids = self.register_intents(&result, ctx, DeploymentIntent::Deploying)?;
        info!(
            deployment_id = %ctx.deployment_id,
            %app_id,
            from = app.instances,
            to = instances,
            marathon_deployments = ?ids,
            "scale submitted"
        );
        Ok(ids)
    }

    fn register_intents(
        &self,
        result: &DeploymentResult,
        ctx: &DeploymentContext,
        intent: DeploymentIntent,
    ) -> OrchestratorResult<Vec<String>> {
        let ids = result.deployment_ids();
        if ids.is_empty() {
            return Err(OrchestratorError::UnexpectedResponse(
                "no deployment id in marathon response".to_string(),
            ));
        }
        let group_id = ctx.group_id();
        for id in &ids {
            self.registry
                .register_deployment_intent(id, &ctx.deployment_id, intent, Some(&group_id));
        }
        Ok(ids)
    }

    // ── Queries ───────────────────────────────────────────────────

    pub async fn get_status(&self, ctx: &DeploymentContext) -> OrchestratorResult<DeploymentStatus> {
        let status = deployment_status(&self.client, &self.retry, &ctx.group_id()).await?;
        debug!(deployment_id = %ctx.deployment_id, ?status, "deployment status");
        Ok(status)
    }

    pub async fn get_instances_information(
        &self,
        ctx: &DeploymentContext,
    ) -> OrchestratorResult<InstancesInformation> {
        Ok(instances_information(&self.client, &self.retry, ctx).await?)
    }

    /// Drain every queued event. `date` and `batch_size` do not filter.
    pub fn get_events_since(&self, date: i64, batch_size: usize) -> Vec<MonitorEvent> {
        let events = self.queue.drain();
        debug!(date, batch_size, drained = events.len(), "events drained");
        events
    }

    // ── No-op host surface ────────────────────────────────────────

    pub fn get_configurator(&self, location_type: &str) -> Option<Box<dyn LocationConfigurator>> {
        debug!(location_type, "no location configurator for marathon");
        None
    }

    pub fn plugin_archives(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    pub fn launch_workflow(
        &self,
        ctx: &DeploymentContext,
        workflow_name: &str,
        inputs: &BTreeMap<String, String>,
    ) -> OrchestratorResult<()> {
        debug!(deployment_id = %ctx.deployment_id, workflow_name, inputs = inputs.len(), "workflow ignored");
        Ok(())
    }

    pub fn switch_maintenance_mode(&self, ctx: &DeploymentContext, enabled: bool) -> OrchestratorResult<()> {
        debug!(deployment_id = %ctx.deployment_id, enabled, "maintenance mode ignored");
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.as_ref().is_some_and(EventSubscriber::is_running)
    }
}
