//! Service port allocation.
//!
//! [`ServicePortCounter`] hands out process-unique ports with an atomic
//! increment and is shared by every build. [`PortAllocator`] is the
//! per-build endpoint table layered on top of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Default first service port.
pub const SERVICE_PORT_FLOOR: u32 = 10_000;

/// Canonical endpoint key: `group/node/capability`, lowercased.
pub fn endpoint_key(group_id: &str, node_id: &str, capability: &str) -> String {
    format!("{group_id}/{node_id}/{capability}").to_lowercase()
}

/// Monotonic service port source. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct ServicePortCounter {
    next: Arc<AtomicU32>,
}

impl ServicePortCounter {
    pub fn starting_at(floor: u32) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(floor)),
        }
    }

    /// Take the next port.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The port the next call to [`next`](Self::next) would return.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for ServicePortCounter {
    fn default() -> Self {
        Self::starting_at(SERVICE_PORT_FLOOR)
    }
}

/// Endpoint key → service port table for a single build.
#[derive(Debug)]
pub struct PortAllocator {
    counter: ServicePortCounter,
    endpoints: HashMap<String, u32>,
}

impl PortAllocator {
    pub fn new(counter: ServicePortCounter) -> Self {
        Self {
            counter,
            endpoints: HashMap::new(),
        }
    }

    /// A fresh port, not bound to any endpoint.
    pub fn allocate(&self) -> u32 {
        self.counter.next()
    }

    pub fn assign(&mut self, endpoint_key: &str, port: u32) {
        self.endpoints.insert(endpoint_key.to_string(), port);
    }

    pub fn get(&self, endpoint_key: &str) -> Option<u32> {
        self.endpoints.get(endpoint_key).copied()
    }

    pub fn contains(&self, endpoint_key: &str) -> bool {
        self.endpoints.contains_key(endpoint_key)
    }

    /// The port bound to `endpoint_key`, allocating one on first use.
    pub fn get_or_allocate(&mut self, endpoint_key: &str) -> u32 {
        if let Some(port) = self.get(endpoint_key) {
            return port;
        }
        let port = self.allocate();
        self.assign(endpoint_key, port);
        port
    }

    /// Forget every endpoint. The counter keeps going.
    pub fn clear(&mut self) {
        self.endpoints.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }
}
