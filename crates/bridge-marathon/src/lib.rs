//! bridge-marathon: the subset of Marathon's v2 API the bridge speaks.
//!
//! - **`types`**: Group / App / Container documents, tasks, deployments
//! - **`events`**: typed SSE event payloads from `/v2/events`
//! - **`client`**: plain HTTP/1.1 client with per-call deadlines
//! - **`retry`**: jittered exponential retry for idempotent reads
//!
//! # Architecture
//!
//! ```text
//! MarathonClient
//!   ├── request_json  (deadline, status → ClientError)
//!   │     ├── POST   /v2/groups
//!   │     ├── DELETE /v2/groups/<id>?force=true
//!   │     ├── GET    /v2/groups/<id>, /v2/deployments
//!   │     ├── GET    /v2/apps/<id>, /v2/apps/<id>/tasks
//!   │     └── PUT    /v2/apps/<id>?force=true
//!   └── open_event_stream  (text/event-stream, no read deadline)
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod retry;
pub mod types;

pub use client::{EventStream, MarathonClient};
pub use error::{ClientError, ClientResult, EventDecodeError};
pub use events::{MarathonEvent, SUBSCRIBED_EVENTS};
pub use retry::{RetryPolicy, retry_read};
pub use types::*;
