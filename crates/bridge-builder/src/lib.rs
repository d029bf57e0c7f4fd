//! bridge-builder: topology to Marathon group translation.
//!
//! Each non-native node becomes one Docker app in a group named after the
//! deployment. `connectsTo` edges are stitched together through service
//! ports load-balanced by marathon-lb:
//!
//! ```text
//! build_group(ctx)
//!   ├── register GroupMapping
//!   ├── pre-pass: one service port per connectsTo target endpoint
//!   ├── per node → App
//!   │     ├── image, instances, resources, cmd/args/env/options
//!   │     ├── endpoint capabilities → PortMappings (HOST or BRIDGE)
//!   │     ├── connectsTo → dependencies
//!   │     ├── create inputs → ENV_ / OPT_ / ARG_
//!   │     ├── attached volumes → external rexray volumes
//!   │     └── health check, AppMapping
//!   └── clear the per-build endpoint table
//! ```
//!
//! Service ports come from a process-wide [`ServicePortCounter`] so they
//! never repeat; the endpoint table is private to each build.

pub mod builder;
pub mod error;
pub mod inputs;
pub mod ports;

pub use builder::TopologyBuilder;
pub use error::{BuildError, BuildResult};
pub use ports::{PortAllocator, ServicePortCounter, endpoint_key};
