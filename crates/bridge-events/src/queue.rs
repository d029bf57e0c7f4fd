//! Normalized event queue.
//!
//! FIFO drained in full by each host poll. The capacity is soft: when it
//! is reached, `push` evicts the oldest deployment progress report (any
//! `deployment_info`, mapped or not), then the oldest instance event.
//! Deployment outcomes are never evicted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::warn;

use bridge_core::MonitorEvent;

/// Default soft capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<MonitorEvent>>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Append an event; returns the event evicted to make room, if any.
    pub fn push(&self, event: MonitorEvent) -> Option<MonitorEvent> {
        let mut events = self.events.lock().expect("events lock");
        let evicted = if events.len() >= self.capacity {
            evict_one(&mut events)
        } else {
            None
        };
        if let Some(ref dropped) = evicted {
            warn!(
                capacity = self.capacity,
                deployment_id = %dropped.deployment_id(),
                "event queue full, dropped oldest non-terminal event"
            );
        }
        events.push_back(event);
        evicted
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<MonitorEvent> {
        let mut events = self.events.lock().expect("events lock");
        events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("events lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn evict_one(events: &mut VecDeque<MonitorEvent>) -> Option<MonitorEvent> {
    let index = events
        .iter()
        .position(MonitorEvent::is_progress)
        .or_else(|| events.iter().position(|e| matches!(e, MonitorEvent::InstanceState(_))))?;
    events.remove(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{
        DeploymentStatus, DeploymentStatusEvent, InstanceStateEvent, InstanceStatus, UNKNOWN_DEPLOYMENT_ID,
    };

    fn deployment_event(date: i64, status: DeploymentStatus) -> MonitorEvent {
        let id = format!("d{date}");
        match status {
            DeploymentStatus::DeploymentInProgress | DeploymentStatus::UndeploymentInProgress => {
                DeploymentStatusEvent::progress(date, id, status).into()
            }
            _ => DeploymentStatusEvent::outcome(date, id, status).into(),
        }
    }

    fn instance_event(date: i64) -> MonitorEvent {
        InstanceStateEvent {
            date,
            deployment_id: "d".into(),
            node_template_id: "web".into(),
            instance_id: format!("task-{date}"),
            instance_state: Some("started".into()),
            instance_status: InstanceStatus::Success,
        }
        .into()
    }

    #[test]
    fn drain_returns_fifo_and_empties() {
        let queue = EventQueue::default();
        for date in 0..5 {
            queue.push(instance_event(date));
        }
        let dates: Vec<i64> = queue.drain().iter().map(MonitorEvent::date).collect();
        assert_eq!(dates, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn evicts_progress_before_instance_events() {
        let queue = EventQueue::new(3);
        queue.push(instance_event(1));
        queue.push(deployment_event(2, DeploymentStatus::DeploymentInProgress));
        queue.push(instance_event(3));

        let evicted = queue.push(instance_event(4)).unwrap();
        assert_eq!(evicted.date(), 2);

        let evicted = queue.push(instance_event(5)).unwrap();
        assert_eq!(evicted.date(), 1);

        let dates: Vec<i64> = queue.drain().iter().map(MonitorEvent::date).collect();
        assert_eq!(dates, vec![3, 4, 5]);
    }

    #[test]
    fn terminal_events_are_never_evicted() {
        let queue = EventQueue::new(2);
        queue.push(deployment_event(1, DeploymentStatus::Deployed));
        queue.push(deployment_event(2, DeploymentStatus::Failure));
        assert!(queue.push(deployment_event(3, DeploymentStatus::Undeployed)).is_none());
        assert!(queue.push(instance_event(4)).is_none());
        assert_eq!(queue.len(), 4);

        // The instance event is now the only candidate.
        let evicted = queue.push(deployment_event(5, DeploymentStatus::Unknown)).unwrap();
        assert_eq!(evicted.date(), 4);
        assert!(queue.drain().iter().all(MonitorEvent::is_terminal));
    }

    #[test]
    fn unmapped_info_events_stay_bounded() {
        let queue = EventQueue::new(2);
        for date in 0..50 {
            let info = DeploymentStatusEvent::progress(date, UNKNOWN_DEPLOYMENT_ID, DeploymentStatus::Unknown);
            queue.push(info.into());
        }
        assert_eq!(queue.len(), 2);
        let dates: Vec<i64> = queue.drain().iter().map(MonitorEvent::date).collect();
        assert_eq!(dates, vec![48, 49]);
    }
}
