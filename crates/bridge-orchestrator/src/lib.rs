//! bridge-orchestrator: the host plugin surface of the Marathon bridge.
//!
//! # Architecture
//!
//! ```text
//! MarathonOrchestrator
//!   ├── deploy / undeploy / scale ──► TopologyBuilder ──► MarathonClient (writes)
//!   │                                   └── MappingRegistry (group + deployment intents)
//!   ├── get_status ─────────────────► Marathon groups, deployments, apps (retried reads)
//!   ├── get_instances_information ──► Marathon app tasks (retried reads)
//!   └── get_events_since ◄── EventQueue ◄── EventSubscriber (SSE, background)
//! ```
//!
//! Operations return `OrchestratorResult`; hosts that expect a
//! success/failure sink wrap them with [`with_callback`].

pub mod callback;
pub mod error;
pub mod instances;
pub mod orchestrator;
pub mod status;

pub use callback::{Callback, with_callback};
pub use error::{OrchestratorError, OrchestratorResult};
pub use instances::InstancesInformation;
pub use orchestrator::{LocationConfigurator, MarathonOrchestrator};
