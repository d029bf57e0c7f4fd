//! bridge-core: shared types for the Marathon topology bridge.
//!
//! Holds everything the other bridge crates agree on:
//!
//! - **`topology`**: the read-only input graph handed over by the host
//!   (non-native nodes, volume nodes, capabilities, relationships)
//! - **`status`**: host-facing deployment and instance statuses
//! - **`events`**: normalized lifecycle events drained by the host
//! - **`config`**: bridge configuration (`marathonURL`, timeouts, ports)

pub mod config;
pub mod events;
pub mod status;
pub mod topology;

pub use config::{BridgeConfig, ConfigError};
pub use events::*;
pub use status::*;
pub use topology::*;
