//! The memory engine: one façade owning storage, indexes, provider, and
//! event bus, exposing the cycle API the agent loop drives.
//!
//! Concurrency model: the agent loop is the sole writer per project;
//! maintenance (decay, consolidation, co-retrieval cleanup) runs from
//! `end_cycle`, between writes. Read queries share the indexes through read
//! locks.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::{Chunk, LearningContext, RetrievalContext};
use crate::clock::TickClock;
use crate::contradiction::{ContradictionDetector, CrossEncoder};
use crate::decay::{DecayEngine, DecayOutcome};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::events::{EventBus, MemoryEvent};
use crate::executor::{TaskExecutor, TaskResult, TaskResultStatus};
use crate::graph::{Direction, Relationship, RelationshipGraph};
use crate::index::{Bm25Index, VectorIndex};
use crate::orientation::OrientationStore;
use crate::planner::{self, OperationalQuery, QueryRoute};
use crate::retrieval::{HybridRetriever, RetrievalResult, RetrieveOptions, RetrievedChunk};
use crate::storage::{StorageBackend, StorageStatistics};
use crate::store::{ChunkStore, StoreOptions, StoredChunk};
use crate::types::{
    Activity, ChunkType, Confidence, MemoryConfig, Orientation, Phase, Project, Question,
    SourceKind, Task, Tick,
};
use crate::working_state::WorkingState;

/// Answer to a planned query: whichever subsystem the planner routed to.
#[derive(Debug)]
pub enum QueryResponse {
    Tasks(Vec<Task>),
    Questions(Vec<Question>),
    Activities(Vec<Activity>),
    Chunks(Vec<RetrievedChunk>),
    Edges(Vec<Relationship>),
}

/// The assembled memory engine.
pub struct MemoryEngine {
    config: MemoryConfig,
    storage: Arc<dyn StorageBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    events: EventBus,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
    graph: Arc<RelationshipGraph>,
    decay: Arc<DecayEngine>,
    chunk_store: ChunkStore,
    retriever: HybridRetriever,
    working_state: WorkingState,
    orientation: OrientationStore,
    /// One clock per project, advanced only from `end_cycle`.
    clocks: Mutex<std::collections::HashMap<Uuid, TickClock>>,
    /// Projects whose keyword index has been rebuilt this process.
    loaded_projects: Mutex<HashSet<Uuid>>,
}

impl MemoryEngine {
    /// Open the engine over a storage backend and embedding provider.
    ///
    /// Blocks until the vector index is rebuilt from the persisted blobs.
    /// Refuses to start when persisted embeddings disagree with the
    /// provider's dimension; reproject or clear them first.
    pub async fn open(
        storage: Arc<dyn StorageBackend>,
        provider: Arc<dyn EmbeddingProvider>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
        config: MemoryConfig,
    ) -> Result<Self> {
        let events = EventBus::default();
        let vector_index = Arc::new(VectorIndex::new(provider.dimensions()));
        let bm25_index = Arc::new(Bm25Index::new());

        let persisted = storage.load_all_embeddings().await?;
        vector_index.load(persisted)?;

        let graph = Arc::new(RelationshipGraph::new(
            Arc::clone(&storage),
            events.clone(),
        ));
        let decay = Arc::new(DecayEngine::new(
            Arc::clone(&storage),
            Arc::clone(&vector_index),
            Arc::clone(&bm25_index),
            events.clone(),
        ));
        let detector = ContradictionDetector::new(
            Arc::clone(&storage),
            Arc::clone(&vector_index),
            cross_encoder,
            config.contradiction.clone(),
        );
        let chunk_store = ChunkStore::new(
            Arc::clone(&storage),
            Arc::clone(&vector_index),
            Arc::clone(&bm25_index),
            Arc::clone(&graph),
            detector,
            Arc::clone(&provider),
            events.clone(),
        );
        let retriever = HybridRetriever::new(
            Arc::clone(&storage),
            Arc::clone(&vector_index),
            Arc::clone(&bm25_index),
            Arc::clone(&graph),
            Arc::clone(&decay),
            Arc::clone(&provider),
            config.retrieval.clone(),
        );
        let working_state = WorkingState::new(Arc::clone(&storage), events.clone());
        let orientation = OrientationStore::new(Arc::clone(&storage));

        info!(
            provider = provider.name(),
            dimensions = provider.dimensions(),
            "memory engine opened"
        );

        Ok(Self {
            config,
            storage,
            provider,
            events,
            vector_index,
            bm25_index,
            graph,
            decay,
            chunk_store,
            retriever,
            working_state,
            orientation,
            clocks: Mutex::new(std::collections::HashMap::new()),
            loaded_projects: Mutex::new(HashSet::new()),
        })
    }

    /// Subscribe to the engine's event stream.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Create a project, its agent state, and (optionally) its first
    /// orientation.
    pub async fn create_project(&self, vision: Option<&str>) -> Result<Project> {
        let project = Project::new();
        self.storage.create_project(&project).await?;
        TickClock::initialize(Arc::clone(&self.storage), project.id).await?;
        if let Some(vision) = vision {
            self.orientation
                .save(Orientation::initial(project.id, vision.to_string()), 0)
                .await?;
        }
        info!(project = %project.id, "project created");
        Ok(project)
    }

    /// Lazily rebuild a project's keyword index on first touch.
    async fn ensure_project_loaded(&self, project_id: Uuid) -> Result<()> {
        let mut loaded = self.loaded_projects.lock().await;
        if loaded.contains(&project_id) {
            return Ok(());
        }

        let chunks = self.storage.list_chunks(project_id).await?;
        if chunks.len() >= self.config.vector.min_project_count_for_index_rebuild {
            let docs = chunks
                .iter()
                .filter(|c| !c.status.is_terminal())
                .map(|c| (c.id, c.chunk_type, c.content.clone()))
                .collect();
            self.bm25_index.rebuild(project_id, docs);
        }
        loaded.insert(project_id);
        Ok(())
    }

    /// The project's current tick.
    pub async fn current_tick(&self, project_id: Uuid) -> Result<Tick> {
        let mut clocks = self.clocks.lock().await;
        if !clocks.contains_key(&project_id) {
            let clock = TickClock::initialize(Arc::clone(&self.storage), project_id).await?;
            clocks.insert(project_id, clock);
        }
        Ok(clocks[&project_id].current())
    }

    /// Store one learning with full context capture.
    #[allow(clippy::too_many_arguments)]
    pub async fn store_learning(
        &self,
        project_id: Uuid,
        content: String,
        chunk_type: ChunkType,
        tags: BTreeSet<String>,
        confidence: Confidence,
        source: SourceKind,
        context: LearningContext,
        options: StoreOptions,
    ) -> Result<StoredChunk> {
        self.ensure_project_loaded(project_id).await?;
        self.chunk_store
            .store(
                project_id, content, chunk_type, tags, confidence, source, context, options,
            )
            .await
    }

    /// Retrieve context for a task or question.
    pub async fn retrieve(
        &self,
        project_id: Uuid,
        context: &RetrievalContext,
        options: &RetrieveOptions,
    ) -> Result<RetrievalResult> {
        self.ensure_project_loaded(project_id).await?;
        self.retriever.retrieve(project_id, context, options).await
    }

    /// Credit retrieved chunks that turned out to be useful.
    pub async fn mark_context_helpful(&self, chunk_ids: &[Uuid], tick: Tick) -> Result<()> {
        for id in chunk_ids {
            if let Some(mut chunk) = self.storage.get_chunk(*id).await? {
                self.decay.reactivate(&mut chunk, tick, true).await?;
            }
        }
        Ok(())
    }

    /// Classify a free-form query and route it.
    pub async fn query(&self, project_id: Uuid, query_text: &str) -> Result<QueryResponse> {
        self.ensure_project_loaded(project_id).await?;
        let tick = self.current_tick(project_id).await?;

        match planner::classify(query_text) {
            QueryRoute::Operational(op) => match op {
                OperationalQuery::BlockedTasks => Ok(QueryResponse::Tasks(
                    self.working_state.blocked_tasks(project_id).await?,
                )),
                OperationalQuery::ReadyTasks => Ok(QueryResponse::Tasks(
                    self.working_state.ready_tasks(project_id).await?,
                )),
                OperationalQuery::OpenQuestions => Ok(QueryResponse::Questions(
                    self.working_state.open_questions(project_id).await?,
                )),
                OperationalQuery::RecentActivity => Ok(QueryResponse::Activities(
                    self.working_state.recent_activity(project_id, 20).await?,
                )),
            },
            QueryRoute::Lookup { terms } => {
                let mut chunks = Vec::new();
                let mut seen = HashSet::new();
                for term in terms {
                    for chunk in self.storage.list_chunks_by_tag(project_id, &term).await? {
                        if seen.insert(chunk.id) {
                            chunks.push(plain_hit(chunk));
                        }
                    }
                }
                Ok(QueryResponse::Chunks(chunks))
            }
            QueryRoute::Connection { relationship_type } => {
                // Anchor on the best semantic match, then walk its edges.
                let context = RetrievalContext::bare(tick, query_text);
                let anchor_options = RetrieveOptions {
                    limit: 1,
                    graph_expansion: false,
                    ..RetrieveOptions::default()
                };
                let anchors = self
                    .retriever
                    .retrieve(project_id, &context, &anchor_options)
                    .await?;
                let Some(anchor) = anchors.hits.first() else {
                    return Ok(QueryResponse::Edges(Vec::new()));
                };
                let defaults = planner::HybridDefaults::default();
                let edges = self
                    .graph
                    .get(
                        anchor.chunk.id,
                        relationship_type,
                        0.0,
                        Direction::Both,
                        defaults.limit,
                    )
                    .await?;
                Ok(QueryResponse::Edges(edges))
            }
            QueryRoute::Exploration => {
                let context = RetrievalContext::bare(tick, query_text);
                let options = RetrieveOptions {
                    limit: planner::HybridDefaults::default().limit,
                    min_similarity: Some(self.config.retrieval.exploration_min_similarity),
                    graph_expansion: false,
                    ..RetrieveOptions::default()
                };
                let result = self.retriever.retrieve(project_id, &context, &options).await?;
                Ok(QueryResponse::Chunks(result.hits))
            }
            QueryRoute::Hybrid => {
                let defaults = planner::HybridDefaults::default();
                let context = RetrievalContext::bare(tick, query_text);
                let options = RetrieveOptions {
                    limit: defaults.limit,
                    graph_expansion: true,
                    graph_min_weight: Some(defaults.min_weight),
                    ..RetrieveOptions::default()
                };
                let mut result = self.retriever.retrieve(project_id, &context, &options).await?;
                planner::apply_confidence_weighting(&mut result.hits);
                Ok(QueryResponse::Chunks(result.hits))
            }
        }
    }

    /// Run one task through the executor capability and absorb the result.
    pub async fn run_task(
        &self,
        executor: &dyn TaskExecutor,
        task_id: Uuid,
    ) -> Result<TaskResult> {
        let task = self.working_state.begin_task(task_id).await?;
        let tick = self.current_tick(task.project_id).await?;
        let orientation = self.orientation.get(task.project_id).await?;

        let goal = self.storage.get_active_goal(task.project_id).await?;
        let context = RetrievalContext {
            tick,
            task_id: Some(task.id),
            goal_id: goal.map(|g| g.id),
            phase: Some(
                orientation
                    .as_ref()
                    .map_or(Phase::Execution, |o| o.current_phase),
            ),
            skill_area: task.skill_area.clone(),
            query_text: format!("{} {}", task.title, task.description),
        };
        let retrieved = self
            .retrieve(task.project_id, &context, &RetrieveOptions::default())
            .await?;

        let result = match executor
            .execute(&task, orientation.as_ref(), &retrieved.hits)
            .await
        {
            Ok(result) => result,
            Err(Error::Parse(raw)) => {
                // Malformed executor output becomes a partial with the raw
                // response preserved as a low-confidence attempt.
                warn!(task = %task.id, "executor response unparseable, recording partial");
                TaskResult {
                    status: TaskResultStatus::Partial,
                    outcome: None,
                    learnings: vec![crate::executor::Learning {
                        content: raw.clone(),
                        chunk_type: ChunkType::Attempt,
                        tags: vec!["unparsed_response".to_string()],
                        confidence: Confidence::Speculative,
                    }],
                    question: None,
                    question_context: None,
                    research_topic: None,
                    research_description: None,
                    error: Some("unparseable executor response".to_string()),
                    failure_context: Some(serde_json::json!({ "raw": raw })),
                }
            }
            Err(Error::LoopExceeded {
                max_turns,
                tool_calls,
            }) => TaskResult {
                status: TaskResultStatus::Partial,
                outcome: None,
                learnings: Vec::new(),
                question: None,
                question_context: None,
                research_topic: None,
                research_description: None,
                error: Some("turn budget exhausted".to_string()),
                failure_context: Some(
                    serde_json::json!({ "max_turns": max_turns, "tool_calls": tool_calls }),
                ),
            },
            Err(other) => return Err(other),
        };

        self.apply_task_result(&task, &result, tick).await?;
        Ok(result)
    }

    /// Absorb a structured task result per the executor contract.
    pub async fn apply_task_result(
        &self,
        task: &Task,
        result: &TaskResult,
        tick: Tick,
    ) -> Result<()> {
        let goal = self.storage.get_active_goal(task.project_id).await?;
        let orientation = self.orientation.get(task.project_id).await?;
        let phase = orientation
            .as_ref()
            .map_or(Phase::Execution, |o| o.current_phase);

        if matches!(
            result.status,
            TaskResultStatus::Complete | TaskResultStatus::Partial
        ) {
            for learning in &result.learnings {
                let context = LearningContext {
                    tick,
                    task_id: Some(task.id),
                    goal_id: goal.as_ref().map(|g| g.id),
                    phase,
                    skill_area: task.skill_area.clone(),
                    query_context: None,
                    related_chunks: Vec::new(),
                };
                self.store_learning(
                    task.project_id,
                    learning.content.clone(),
                    learning.chunk_type,
                    learning.tags.iter().cloned().collect(),
                    learning.confidence,
                    learning.source(),
                    context,
                    StoreOptions::default(),
                )
                .await?;
            }
        }

        match result.status {
            TaskResultStatus::Complete => {
                self.working_state
                    .complete_task(task.id, result.outcome.clone())
                    .await?;
            }
            TaskResultStatus::Partial => {
                // A partial is a normal outcome: the task goes back to ready
                // with its partial context attached, eligible for re-pick.
                let mut task = self
                    .storage
                    .get_task(task.id)
                    .await?
                    .ok_or(Error::NotFound(task.id))?;
                task.status = crate::types::TaskStatus::Ready;
                task.failure_reason = Some("partial".to_string());
                task.failure_context = result.failure_context.clone();
                task.updated_at = chrono::Utc::now();
                self.storage.update_task(&task).await?;
            }
            TaskResultStatus::Blocked => {
                let text = result
                    .question
                    .clone()
                    .unwrap_or_else(|| "executor blocked without a question".to_string());
                self.working_state
                    .create_question(
                        task.project_id,
                        &text,
                        result.question_context.clone(),
                        vec![task.id],
                    )
                    .await?;
            }
            TaskResultStatus::NeedsResearch => {
                let topic = result
                    .research_topic
                    .clone()
                    .unwrap_or_else(|| "unspecified research topic".to_string());
                let description = result.research_description.clone().unwrap_or_default();
                self.working_state
                    .create_task(
                        task.project_id,
                        &topic,
                        &description,
                        task.skill_area.clone(),
                        BTreeSet::new(),
                    )
                    .await?;
            }
            TaskResultStatus::Failed => {
                let reason = result.error.clone().unwrap_or_else(|| "unknown".to_string());
                self.working_state
                    .fail_task(task.id, &reason, result.failure_context.clone())
                    .await?;
            }
        }
        Ok(())
    }

    /// Close one agent cycle: advance the tick, then run whatever
    /// maintenance is due.
    pub async fn end_cycle(&self, project_id: Uuid) -> Result<Tick> {
        let mut clocks = self.clocks.lock().await;
        let clock = match clocks.entry(project_id) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(TickClock::initialize(Arc::clone(&self.storage), project_id).await?)
            }
        };

        let tick = clock.increment().await?;
        self.events.publish(MemoryEvent::TickAdvance { project_id, tick });

        if clock.should_run_decay(self.config.decay.tick_interval) {
            let last = clock.last_decay_tick();
            self.decay.run(project_id, tick, last).await?;
            clock.mark_decay_run().await?;
        }

        if clock.should_run_consolidation(self.config.consolidation.tick_interval) {
            self.graph
                .consolidate_implicit(project_id, &self.config.implicit_edges)
                .await?;
            self.graph
                .cleanup_coretrieval(
                    project_id,
                    tick,
                    self.config.consolidation.coretrieval_keep_ticks,
                )
                .await?;
            clock.mark_consolidation_run().await?;
        }

        drop(clocks);

        self.working_state.apply_pending_goal(project_id).await?;
        Ok(tick)
    }

    /// Force a decay sweep regardless of the gate. Test and operator hook.
    pub async fn run_decay_now(&self, project_id: Uuid) -> Result<DecayOutcome> {
        let mut clocks = self.clocks.lock().await;
        let clock = match clocks.entry(project_id) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(TickClock::initialize(Arc::clone(&self.storage), project_id).await?)
            }
        };
        let outcome = self
            .decay
            .run(project_id, clock.current(), clock.last_decay_tick())
            .await?;
        clock.mark_decay_run().await?;
        Ok(outcome)
    }

    /// Re-embed chunks stored during provider outages.
    pub async fn reembed_pending(&self, project_id: Uuid) -> Result<usize> {
        self.chunk_store.reembed_pending(project_id).await
    }

    /// The working-state API.
    #[must_use]
    pub fn working_state(&self) -> &WorkingState {
        &self.working_state
    }

    /// The orientation store.
    #[must_use]
    pub fn orientation(&self) -> &OrientationStore {
        &self.orientation
    }

    /// The relationship graph.
    #[must_use]
    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// Storage row counts.
    pub async fn statistics(&self, project_id: Uuid) -> Result<StorageStatistics> {
        self.storage.statistics(project_id).await
    }

    /// Direct chunk access.
    pub async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        self.storage.get_chunk(id).await
    }

    /// The embedding provider in use.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// The vector index (read access for diagnostics).
    #[must_use]
    pub fn vector_index(&self) -> &Arc<VectorIndex> {
        &self.vector_index
    }
}

/// Wrap a chunk as a hit for routes that bypass scoring.
fn plain_hit(chunk: Chunk) -> RetrievedChunk {
    let strength = chunk.current_strength;
    RetrievedChunk {
        chunk,
        raw_similarity: 0.0,
        score: strength,
        boosted: false,
        boost_reason: None,
        sources: crate::retrieval::ScoreSources::default(),
    }
}
