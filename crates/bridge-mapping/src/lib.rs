//! bridge-mapping: correlates Marathon ids with topology ids.
//!
//! Marathon only knows groups, apps, tasks, and deployment ids; the host
//! only knows deployment ids and node template ids. The registry keeps
//! the two tables that translate between them:
//!
//! ```text
//! MappingRegistry
//!   ├── groups:      groupId → GroupMapping { topology deployment, appId → node }
//!   └── deployments: marathon deployment id → DeploymentMapping { topology deployment, intent }
//! ```
//!
//! Clones share the same tables.

pub mod registry;

pub use registry::{DeploymentIntent, DeploymentMapping, GroupMapping, MappingRegistry};
