//! Build lifecycle notifications
//!
//! Components receive an [`EventSink`] at construction and publish through
//! it; delivery is fire-and-forget.

use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

use crate::config::defaults::DEFAULT_EVENT_CAPACITY;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A ticket was issued; payload is the config id
    ExternalBuildRequested,
    /// A build finished; payload is the build name
    BuildCompleted,
    /// A build was removed; payload is the build name
    BuildDeleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExternalBuildRequested => "external-build-requested",
            Self::BuildCompleted => "build-completed",
            Self::BuildDeleted => "build-deleted",
        };
        f.write_str(s)
    }
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildEvent {
    pub kind: EventKind,
    pub payload: String,
}

impl BuildEvent {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

/// Publish side of the event channel
pub trait EventSink: Send + Sync {
    /// Publish an event; never blocks, never fails
    fn publish(&self, event: BuildEvent);
}

/// Broadcast-backed event channel
#[derive(Debug, Clone)]
pub struct EventBroker {
    sender: broadcast::Sender<BuildEvent>,
}

impl EventBroker {
    /// Create a broker that buffers up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for EventBroker {
    fn publish(&self, event: BuildEvent) {
        tracing::debug!("Event {}: {}", event.kind, event.payload);
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}
