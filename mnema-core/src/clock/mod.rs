//! Per-project cognitive time.
//!
//! One tick per completed agent cycle. Decay, recency, and co-retrieval
//! cleanup all consume ticks; wall-clock timestamps exist for audit only and
//! never enter a scoring formula.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::StorageBackend;
use crate::types::{AgentState, Tick};

/// Monotonic tick counter for one project, persisted through agent state.
pub struct TickClock {
    storage: Arc<dyn StorageBackend>,
    state: AgentState,
}

impl TickClock {
    /// Load the project's agent state, creating it at tick 0 if absent.
    pub async fn initialize(storage: Arc<dyn StorageBackend>, project_id: Uuid) -> Result<Self> {
        let state = match storage.get_agent_state(project_id).await? {
            Some(state) => state,
            None => {
                let state = AgentState::new(project_id);
                storage.save_agent_state(&state).await?;
                state
            }
        };
        debug!(project = %project_id, tick = state.current_tick, "tick clock initialized");
        Ok(Self { storage, state })
    }

    /// Advance by one tick and persist.
    pub async fn increment(&mut self) -> Result<Tick> {
        self.state.current_tick += 1;
        self.storage.save_agent_state(&self.state).await?;
        Ok(self.state.current_tick)
    }

    /// The current tick.
    #[must_use]
    pub fn current(&self) -> Tick {
        self.state.current_tick
    }

    /// The tick decay last ran at.
    #[must_use]
    pub fn last_decay_tick(&self) -> Tick {
        self.state.last_decay_tick
    }

    /// Whether at least `interval` ticks have passed since the last decay run.
    #[must_use]
    pub fn should_run_decay(&self, interval: Tick) -> bool {
        self.state.current_tick.saturating_sub(self.state.last_decay_tick) >= interval
    }

    /// Record that decay ran at the current tick.
    ///
    /// Callers that update chunk strengths must persist them in the same
    /// transaction boundary before calling this, so a rerun with Δ = 0 is a
    /// no-op.
    pub async fn mark_decay_run(&mut self) -> Result<()> {
        self.state.last_decay_tick = self.state.current_tick;
        self.storage.save_agent_state(&self.state).await
    }

    /// Whether consolidation is due.
    #[must_use]
    pub fn should_run_consolidation(&self, interval: Tick) -> bool {
        self.state
            .current_tick
            .saturating_sub(self.state.last_consolidation_tick)
            >= interval
    }

    /// Record that consolidation ran at the current tick.
    pub async fn mark_consolidation_run(&mut self) -> Result<()> {
        self.state.last_consolidation_tick = self.state.current_tick;
        self.storage.save_agent_state(&self.state).await
    }

    /// The backing agent state snapshot.
    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state
    }
}
