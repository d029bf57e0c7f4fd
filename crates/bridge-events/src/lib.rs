//! bridge-events: Marathon event stream → normalized lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! EventSubscriber (background task)
//!   ├── MarathonClient::open_event_stream  (reconnect with ReconnectBackoff)
//!   ├── SseDecoder  (bytes → (event, data) frames)
//!   └── EventPipeline
//!         ├── EventNormalizer  (MarathonEvent + MappingRegistry → MonitorEvent)
//!         └── EventQueue       (bounded FIFO, drained by the host)
//! ```
//!
//! Events reach the queue in the order Marathon emitted them. Events sent
//! while the stream is disconnected are lost; Marathon does not replay.

pub mod backoff;
pub mod normalizer;
pub mod queue;
pub mod sse;
pub mod subscriber;

pub use backoff::ReconnectBackoff;
pub use normalizer::EventNormalizer;
pub use queue::EventQueue;
pub use sse::{SseDecoder, SseFrame};
pub use subscriber::{EventPipeline, EventSubscriber};
