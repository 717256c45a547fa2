#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

//! # Mnema Core
//!
//! Memory substrate for autonomous learning agents: knowledge accumulates as
//! decaying chunks, gets retrieved through a hybrid semantic/keyword/graph
//! pipeline, and carries the task, question, and goal state the agent loop
//! schedules against.
//!
//! ## Core Concepts
//!
//! - **Chunks**: units of knowledge with content, learning context, and a
//!   strength that decays over cognitive time (ticks)
//! - **Relationships**: typed weighted edges between chunks, asserted
//!   explicitly or promoted from co-retrieval observations
//! - **Ticks**: one per completed agent cycle; the only time source decay
//!   and recency ever consult
//! - **Working state**: tasks, blocking questions, goals, and the activity
//!   log the prioritizer reads
//! - **Orientation**: the versioned strategic snapshot rewritten at
//!   milestones
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use mnema_core::chunk::{LearningContext, RetrievalContext};
//! use mnema_core::embeddings::MockProvider;
//! use mnema_core::engine::MemoryEngine;
//! use mnema_core::store::StoreOptions;
//! use mnema_core::retrieval::RetrieveOptions;
//! use mnema_core::types::{ChunkType, Confidence, MemoryConfig, Phase, SourceKind};
//!
//! # async fn example(storage: Arc<dyn mnema_core::storage::StorageBackend>) -> mnema_core::Result<()> {
//! let provider = Arc::new(MockProvider::new(384));
//! let engine = MemoryEngine::open(storage, provider, None, MemoryConfig::default()).await?;
//!
//! let project = engine.create_project(Some("learn jazz guitar")).await?;
//!
//! engine
//!     .store_learning(
//!         project.id,
//!         "ii-V-I is the core jazz cadence".to_string(),
//!         ChunkType::Research,
//!         BTreeSet::from(["jazz".to_string(), "harmony".to_string()]),
//!         Confidence::Verified,
//!         SourceKind::Research,
//!         LearningContext::at_tick(0, Phase::Research),
//!         StoreOptions::default(),
//!     )
//!     .await?;
//!
//! let hits = engine
//!     .retrieve(
//!         project.id,
//!         &RetrievalContext::bare(0, "jazz chord progression"),
//!         &RetrieveOptions::default(),
//!     )
//!     .await?;
//! println!("found {} chunks", hits.hits.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`]: the façade the agent loop drives
//! - [`chunk`], [`types`]: the data model
//! - [`store`]: the write path, including the contradiction gate
//! - [`retrieval`], [`planner`]: the read path
//! - [`decay`]: forgetting curves, persistence scoring, reactivation
//! - [`graph`]: relationships and co-retrieval promotion
//! - [`contradiction`]: conflict heuristics and the cross-encoder hook
//! - [`working_state`], [`orientation`], [`clock`]: agent-loop state
//! - [`index`], [`embeddings`], [`storage`], [`events`]: infrastructure

pub mod chunk;
pub mod clock;
pub mod contradiction;
pub mod decay;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod index;
pub mod orientation;
pub mod planner;
pub mod retrieval;
pub mod storage;
pub mod store;
pub mod types;
pub mod working_state;

// Re-export commonly used types
pub use chunk::{Chunk, LearningContext, RetrievalContext};
pub use engine::{MemoryEngine, QueryResponse};
pub use error::{Error, Result};
pub use events::{EventBus, MemoryEvent};
pub use executor::{Learning, TaskExecutor, TaskResult, TaskResultStatus};
pub use graph::{CoRetrievalRecord, Direction, Relationship};
pub use index::{Bm25Index, VectorEntry, VectorIndex};
pub use retrieval::{BoostReason, RetrievedChunk, RetrieveOptions, SearchOutcome};
pub use storage::{StorageBackend, StorageStatistics};
pub use store::{StoreOptions, StoredChunk};
pub use types::{
    AgentState, ChunkStatus, ChunkType, Confidence, ConflictType, ContradictionAction,
    DecayFunction, Goal, MemoryConfig, Orientation, Phase, Project, Question, QuestionStatus,
    RelationshipOrigin, RelationshipType, SourceKind, Task, TaskStatus, Tick,
};
