// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Live fan-out for the Event Log (§4.1). Wraps a `tokio::sync::broadcast`
//! channel over `domain::event::Event`, grounded in the teacher's
//! `EventBus`. Durable history is a separate concern (`EventRepository`);
//! this type only serves subscribers watching a task in real time (SSE,
//! the MCP notification stream).

use crate::domain::event::Event;
use tokio::sync::broadcast;

/// Matches the teacher's broadcast channel capacity; a slow subscriber that
/// falls behind by this many events sees `RecvError::Lagged` rather than
/// blocking publishers.
const CHANNEL_CAPACITY: usize = 4096;

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Best-effort: a `send` with no active subscribers is not an error,
    /// matching the teacher's "nobody's listening" tolerance.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskId;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let event = Event::task_status(TaskId::new(), "running", serde_json::json!({}));
        bus.publish(event.clone());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "task.running");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(Event::task_status(TaskId::new(), "queued", serde_json::json!({})));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_their_own_copy() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(Event::task_status(TaskId::new(), "completed", serde_json::json!({})));
        assert_eq!(rx1.recv().await.unwrap().event_type, "task.completed");
        assert_eq!(rx2.recv().await.unwrap().event_type, "task.completed");
    }
}
