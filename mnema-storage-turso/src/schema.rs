//! Database schema for the mnema substrate.
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so schema
//! initialization doubles as migration for fresh columns-free releases.
//! Foreign keys are declared here and enforced via `PRAGMA foreign_keys`
//! at connection time; deleting a project cascades through everything it
//! owns.

/// Projects: the top-level container.
pub const CREATE_PROJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// Orientation: exactly one row per project, serialized snapshot plus the
/// version surfaced as a column for quick reads.
pub const CREATE_ORIENTATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orientation (
    project_id TEXT PRIMARY KEY NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    data TEXT NOT NULL,
    version INTEGER NOT NULL,
    last_rewritten TEXT NOT NULL
)
"#;

/// Tasks with their dependency and blocking sets as JSON arrays.
pub const CREATE_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    skill_area TEXT,
    status TEXT NOT NULL,
    depends_on TEXT NOT NULL DEFAULT '[]',
    blocked_by TEXT NOT NULL DEFAULT '[]',
    outcome TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    failed_at TEXT,
    failure_reason TEXT,
    failure_context TEXT
)
"#;

pub const CREATE_TASKS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tasks_project_status
ON tasks(project_id, status)
"#;

/// Blocking questions.
pub const CREATE_QUESTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    question_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    context TEXT,
    status TEXT NOT NULL,
    answer TEXT,
    blocks_tasks TEXT NOT NULL DEFAULT '[]',
    asked_at TEXT NOT NULL,
    answered_at TEXT
)
"#;

pub const CREATE_QUESTIONS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_questions_project_status
ON questions(project_id, status)
"#;

/// Append-only activity log.
pub const CREATE_ACTIVITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
    activity_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    action TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '{}',
    timestamp TEXT NOT NULL
)
"#;

pub const CREATE_ACTIVITIES_TIME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_activities_project_time
ON activities(project_id, timestamp DESC)
"#;

/// Chunks: the memory unit. Tag sets and learning context are JSON text;
/// ticks are integers; wall-clock columns are RFC 3339 strings.
pub const CREATE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    chunk_type TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    confidence TEXT NOT NULL,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    last_useful TEXT,
    tick_created INTEGER NOT NULL,
    tick_last_accessed INTEGER,
    tick_last_useful INTEGER,
    learning_context TEXT NOT NULL,
    initial_strength REAL NOT NULL,
    current_strength REAL NOT NULL,
    decay_function TEXT NOT NULL,
    decay_rate REAL NOT NULL,
    persistence_score REAL NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    successful_uses INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    pinned INTEGER NOT NULL DEFAULT 0,
    superseded_by TEXT,
    valid_until_tick INTEGER,
    embedding_pending INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_CHUNKS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunks_project_status
ON chunks(project_id, status)
"#;

pub const CREATE_CHUNKS_PENDING_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunks_embedding_pending
ON chunks(project_id, embedding_pending)
"#;

/// Embedding blobs: little-endian f32 vectors, removed when the owning
/// chunk goes away.
pub const CREATE_CHUNK_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT PRIMARY KEY NOT NULL
        REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    project_id TEXT NOT NULL,
    vector BLOB NOT NULL
)
"#;

/// Live relationship edges, unique per (from, to, type).
pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relationships (
    relationship_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    from_chunk TEXT NOT NULL
        REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    to_chunk TEXT NOT NULL
        REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    relationship_type TEXT NOT NULL,
    weight REAL NOT NULL,
    last_activated TEXT NOT NULL,
    activation_count INTEGER NOT NULL DEFAULT 0,
    context_tags TEXT NOT NULL DEFAULT '[]',
    origin TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (from_chunk, to_chunk, relationship_type)
)
"#;

pub const CREATE_RELATIONSHIPS_FROM_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_from
ON relationships(from_chunk, weight DESC)
"#;

pub const CREATE_RELATIONSHIPS_TO_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_to
ON relationships(to_chunk, weight DESC)
"#;

/// Archived edges, written before removal from the live set.
pub const CREATE_RELATIONSHIPS_ARCHIVE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relationships_archive (
    relationship_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    final_weight REAL NOT NULL,
    reason TEXT NOT NULL,
    original_data TEXT NOT NULL,
    archived_at TEXT NOT NULL
)
"#;

/// Co-retrieval observations, pruned by tick age.
pub const CREATE_CORETRIEVAL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coretrieval (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    chunk_a TEXT NOT NULL,
    chunk_b TEXT NOT NULL,
    session_id TEXT NOT NULL,
    query_context TEXT NOT NULL,
    tick INTEGER NOT NULL,
    observed_at TEXT NOT NULL
)
"#;

pub const CREATE_CORETRIEVAL_PAIR_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_coretrieval_pair
ON coretrieval(project_id, chunk_a, chunk_b)
"#;

pub const CREATE_CORETRIEVAL_TICK_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_coretrieval_tick
ON coretrieval(project_id, tick)
"#;

/// Chunk archive rows, written exactly once per tombstone transition.
pub const CREATE_CHUNKS_ARCHIVE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunks_archive (
    chunk_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    summary TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    final_strength REAL NOT NULL,
    tick_archived INTEGER NOT NULL
)
"#;

/// Goals. The partial unique index enforces at most one active goal per
/// project at the storage level.
pub const CREATE_GOALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    goal_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    goal_text TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    outcome TEXT
)
"#;

pub const CREATE_GOALS_ACTIVE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_goals_one_active
ON goals(project_id) WHERE active = 1
"#;

/// Single-slot pending goal per project.
pub const CREATE_PENDING_GOALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pending_goals (
    project_id TEXT PRIMARY KEY NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    goal_text TEXT NOT NULL,
    queued_at TEXT NOT NULL
)
"#;

/// Flagged contradictions kept for operator review.
pub const CREATE_COHERENCE_WARNINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coherence_warnings (
    warning_id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    new_chunk_id TEXT NOT NULL,
    existing_chunk_id TEXT NOT NULL,
    confidence REAL NOT NULL,
    conflict_type TEXT NOT NULL,
    explanation TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// Per-project cognitive-time bookkeeping.
pub const CREATE_AGENT_STATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS agent_state (
    project_id TEXT PRIMARY KEY NOT NULL
        REFERENCES projects(project_id) ON DELETE CASCADE,
    current_tick INTEGER NOT NULL DEFAULT 0,
    last_decay_tick INTEGER NOT NULL DEFAULT 0,
    last_consolidation_tick INTEGER NOT NULL DEFAULT 0
)
"#;

/// All tables in creation order (parents before children).
pub const ALL_TABLES: &[&str] = &[
    CREATE_PROJECTS_TABLE,
    CREATE_ORIENTATION_TABLE,
    CREATE_TASKS_TABLE,
    CREATE_QUESTIONS_TABLE,
    CREATE_ACTIVITIES_TABLE,
    CREATE_CHUNKS_TABLE,
    CREATE_CHUNK_EMBEDDINGS_TABLE,
    CREATE_RELATIONSHIPS_TABLE,
    CREATE_RELATIONSHIPS_ARCHIVE_TABLE,
    CREATE_CORETRIEVAL_TABLE,
    CREATE_CHUNKS_ARCHIVE_TABLE,
    CREATE_GOALS_TABLE,
    CREATE_PENDING_GOALS_TABLE,
    CREATE_COHERENCE_WARNINGS_TABLE,
    CREATE_AGENT_STATE_TABLE,
];

/// All indexes.
pub const ALL_INDEXES: &[&str] = &[
    CREATE_TASKS_STATUS_INDEX,
    CREATE_QUESTIONS_STATUS_INDEX,
    CREATE_ACTIVITIES_TIME_INDEX,
    CREATE_CHUNKS_STATUS_INDEX,
    CREATE_CHUNKS_PENDING_INDEX,
    CREATE_RELATIONSHIPS_FROM_INDEX,
    CREATE_RELATIONSHIPS_TO_INDEX,
    CREATE_CORETRIEVAL_PAIR_INDEX,
    CREATE_CORETRIEVAL_TICK_INDEX,
    CREATE_GOALS_ACTIVE_INDEX,
];
