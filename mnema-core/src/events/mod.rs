//! Typed event stream.
//!
//! The core publishes a fixed, enumerated event set over a broadcast
//! channel. Subscribers (dashboards, loggers) hold receivers; the core
//! keeps no reference to them and never blocks on delivery — a lagging
//! receiver just drops events.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{RelationshipType, TaskStatus, Tick};

/// Every event the memory core can emit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MemoryEvent {
    TickAdvance {
        project_id: Uuid,
        tick: Tick,
    },
    ChunkStored {
        id: Uuid,
    },
    ContradictionDetected {
        new_id: Uuid,
        existing_id: Uuid,
        confidence: f32,
    },
    EdgeCreated {
        from: Uuid,
        to: Uuid,
        relationship_type: RelationshipType,
        weight: f32,
    },
    TaskStateChanged {
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },
    QuestionAsked {
        id: Uuid,
    },
    QuestionAnswered {
        id: Uuid,
    },
    GoalSet {
        id: Uuid,
    },
    DecayRun {
        project_id: Uuid,
        processed: usize,
        tombstoned: usize,
        avg_strength: f32,
    },
}

/// Broadcast bus for [`MemoryEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MemoryEvent>,
}

impl EventBus {
    /// Create a bus with the given buffered capacity per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the stream. Missed events are dropped, not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. A send with no receivers is not an error.
    pub fn publish(&self, event: MemoryEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
