//! Task, question, goal, activity, and coherence-warning storage.

use libsql::{params, Connection};
use mnema_core::error::Result;
use mnema_core::types::{
    Activity, CoherenceWarning, Goal, PendingGoal, Question, QuestionStatus, Task, TaskStatus,
};
use tracing::debug;
use uuid::Uuid;

use crate::rows::{
    row_to_activity, row_to_coherence_warning, row_to_goal, row_to_pending_goal, row_to_question,
    row_to_task, storage_err, TASK_COLUMNS,
};
use crate::TursoStorage;

fn opt_text(value: Option<String>) -> libsql::Value {
    value.map_or(libsql::Value::Null, libsql::Value::Text)
}

async fn write_task(conn: &Connection, task: &Task) -> Result<()> {
    let depends_on: Vec<String> = task.depends_on.iter().map(Uuid::to_string).collect();
    let blocked_by: Vec<String> = task.blocked_by.iter().map(Uuid::to_string).collect();
    let failure_context = task
        .failure_context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"
        INSERT OR REPLACE INTO tasks (
            task_id, project_id, title, description, skill_area, status,
            depends_on, blocked_by, outcome, created_at, updated_at,
            started_at, completed_at, failed_at, failure_reason, failure_context
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        libsql::params_from_iter(vec![
            libsql::Value::Text(task.id.to_string()),
            libsql::Value::Text(task.project_id.to_string()),
            libsql::Value::Text(task.title.clone()),
            libsql::Value::Text(task.description.clone()),
            opt_text(task.skill_area.clone()),
            libsql::Value::Text(task.status.to_string()),
            libsql::Value::Text(serde_json::to_string(&depends_on)?),
            libsql::Value::Text(serde_json::to_string(&blocked_by)?),
            opt_text(task.outcome.clone()),
            libsql::Value::Text(task.created_at.to_rfc3339()),
            libsql::Value::Text(task.updated_at.to_rfc3339()),
            opt_text(task.started_at.map(|t| t.to_rfc3339())),
            opt_text(task.completed_at.map(|t| t.to_rfc3339())),
            opt_text(task.failed_at.map(|t| t.to_rfc3339())),
            opt_text(task.failure_reason.clone()),
            opt_text(failure_context),
        ]),
    )
    .await
    .map_err(|e| storage_err("Failed to store task", e))?;
    Ok(())
}

async fn write_question(conn: &Connection, question: &Question) -> Result<()> {
    let blocks: Vec<String> = question.blocks_tasks.iter().map(Uuid::to_string).collect();
    conn.execute(
        r#"
        INSERT OR REPLACE INTO questions (
            question_id, project_id, text, context, status, answer,
            blocks_tasks, asked_at, answered_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        libsql::params_from_iter(vec![
            libsql::Value::Text(question.id.to_string()),
            libsql::Value::Text(question.project_id.to_string()),
            libsql::Value::Text(question.text.clone()),
            opt_text(question.context.clone()),
            libsql::Value::Text(question.status.to_string()),
            opt_text(question.answer.clone()),
            libsql::Value::Text(serde_json::to_string(&blocks)?),
            libsql::Value::Text(question.asked_at.to_rfc3339()),
            opt_text(question.answered_at.map(|t| t.to_rfc3339())),
        ]),
    )
    .await
    .map_err(|e| storage_err("Failed to store question", e))?;
    Ok(())
}

async fn write_goal(conn: &Connection, goal: &Goal) -> Result<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO goals (
            goal_id, project_id, goal_text, active, created_at, completed_at, outcome
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        libsql::params_from_iter(vec![
            libsql::Value::Text(goal.id.to_string()),
            libsql::Value::Text(goal.project_id.to_string()),
            libsql::Value::Text(goal.goal_text.clone()),
            libsql::Value::Integer(i64::from(goal.active)),
            libsql::Value::Text(goal.created_at.to_rfc3339()),
            opt_text(goal.completed_at.map(|t| t.to_rfc3339())),
            opt_text(goal.outcome.clone()),
        ]),
    )
    .await
    .map_err(|e| storage_err("Failed to store goal", e))?;
    Ok(())
}

impl TursoStorage {
    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        debug!("Storing task: {}", task.id);
        let conn = self.connect().await?;
        write_task(&conn, task).await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let conn = self.connect().await?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?");
        let mut result_rows = conn
            .query(&sql, params![id.to_string()])
            .await
            .map_err(|e| storage_err("Failed to query task", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch task row", e))?
        {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn update_task(&self, task: &Task) -> Result<()> {
        let conn = self.connect().await?;
        write_task(&conn, task).await
    }

    /// Batch task update in one transaction (unblock sweeps).
    pub async fn update_tasks(&self, tasks: &[Task]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        for task in tasks {
            write_task(&tx, task).await?;
        }
        Self::commit(tx).await
    }

    pub async fn list_tasks(
        &self,
        project_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>> {
        let conn = self.connect().await?;
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?");
        let mut query_params = vec![libsql::Value::Text(project_id.to_string())];
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            query_params.push(libsql::Value::Text(status.to_string()));
        }
        sql.push_str(" ORDER BY created_at");

        let mut result_rows = conn
            .query(&sql, libsql::params_from_iter(query_params))
            .await
            .map_err(|e| storage_err("Failed to query tasks", e))?;

        let mut tasks = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch task row", e))?
        {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    pub async fn insert_question(&self, question: &Question) -> Result<()> {
        debug!("Storing question: {}", question.id);
        let conn = self.connect().await?;
        write_question(&conn, question).await
    }

    pub async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT question_id, project_id, text, context, status, answer, \
                 blocks_tasks, asked_at, answered_at FROM questions WHERE question_id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query question", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch question row", e))?
        {
            Some(row) => Ok(Some(row_to_question(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist an answered question and every task it released in one
    /// transaction.
    pub async fn answer_question(&self, question: &Question, updated_tasks: &[Task]) -> Result<()> {
        debug!(
            "Answering question {} ({} tasks released)",
            question.id,
            updated_tasks.len()
        );
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        write_question(&tx, question).await?;
        for task in updated_tasks {
            write_task(&tx, task).await?;
        }
        Self::commit(tx).await
    }

    pub async fn list_questions(
        &self,
        project_id: Uuid,
        status: Option<QuestionStatus>,
    ) -> Result<Vec<Question>> {
        let conn = self.connect().await?;
        let mut sql = String::from(
            "SELECT question_id, project_id, text, context, status, answer, \
             blocks_tasks, asked_at, answered_at FROM questions WHERE project_id = ?",
        );
        let mut query_params = vec![libsql::Value::Text(project_id.to_string())];
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            query_params.push(libsql::Value::Text(status.to_string()));
        }
        sql.push_str(" ORDER BY asked_at");

        let mut result_rows = conn
            .query(&sql, libsql::params_from_iter(query_params))
            .await
            .map_err(|e| storage_err("Failed to query questions", e))?;

        let mut questions = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch question row", e))?
        {
            questions.push(row_to_question(&row)?);
        }
        Ok(questions)
    }

    /// Activate a goal, completing the prior active goal in the same
    /// transaction. The partial unique index on active goals makes a
    /// violation impossible to commit.
    pub async fn set_goal(&self, goal: &Goal, completed_prior: Option<&Goal>) -> Result<()> {
        let conn = self.connect().await?;
        let tx = Self::begin(&conn).await?;
        if let Some(prior) = completed_prior {
            write_goal(&tx, prior).await?;
        }
        write_goal(&tx, goal).await?;
        Self::commit(tx).await
    }

    pub async fn get_active_goal(&self, project_id: Uuid) -> Result<Option<Goal>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT goal_id, project_id, goal_text, active, created_at, completed_at, \
                 outcome FROM goals WHERE project_id = ? AND active = 1",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query active goal", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch goal row", e))?
        {
            Some(row) => Ok(Some(row_to_goal(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT goal_id, project_id, goal_text, active, created_at, completed_at, \
                 outcome FROM goals WHERE goal_id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query goal", e))?;

        match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch goal row", e))?
        {
            Some(row) => Ok(Some(row_to_goal(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn set_pending_goal(&self, pending: &PendingGoal) -> Result<()> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT OR REPLACE INTO pending_goals (project_id, goal_text, queued_at) \
             VALUES (?, ?, ?)",
            params![
                pending.project_id.to_string(),
                pending.goal_text.clone(),
                pending.queued_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to store pending goal", e))?;
        Ok(())
    }

    /// Remove and return the single-slot pending goal.
    pub async fn take_pending_goal(&self, project_id: Uuid) -> Result<Option<PendingGoal>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT project_id, goal_text, queued_at FROM pending_goals WHERE project_id = ?",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query pending goal", e))?;

        let pending = match result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch pending goal", e))?
        {
            Some(row) => row_to_pending_goal(&row)?,
            None => return Ok(None),
        };

        conn.execute(
            "DELETE FROM pending_goals WHERE project_id = ?",
            params![project_id.to_string()],
        )
        .await
        .map_err(|e| storage_err("Failed to clear pending goal", e))?;
        Ok(Some(pending))
    }

    pub async fn log_activity(&self, activity: &Activity) -> Result<()> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO activities (activity_id, project_id, action, details, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                activity.id.to_string(),
                activity.project_id.to_string(),
                activity.action.clone(),
                serde_json::to_string(&activity.details)?,
                activity.timestamp.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to log activity", e))?;
        Ok(())
    }

    pub async fn recent_activities(&self, project_id: Uuid, limit: usize) -> Result<Vec<Activity>> {
        let conn = self.connect().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut result_rows = conn
            .query(
                &format!(
                    "SELECT activity_id, project_id, action, details, timestamp \
                     FROM activities WHERE project_id = ? \
                     ORDER BY timestamp DESC LIMIT {limit}"
                ),
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query activities", e))?;

        let mut activities = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch activity row", e))?
        {
            activities.push(row_to_activity(&row)?);
        }
        Ok(activities)
    }

    pub async fn insert_coherence_warning(&self, warning: &CoherenceWarning) -> Result<()> {
        let conn = self.connect().await?;
        conn.execute(
            r#"
            INSERT INTO coherence_warnings (
                warning_id, project_id, new_chunk_id, existing_chunk_id,
                confidence, conflict_type, explanation, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                warning.id.to_string(),
                warning.project_id.to_string(),
                warning.new_chunk_id.to_string(),
                warning.existing_chunk_id.to_string(),
                f64::from(warning.confidence),
                warning.conflict_type.clone(),
                warning.explanation.clone(),
                warning.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| storage_err("Failed to store coherence warning", e))?;
        Ok(())
    }

    pub async fn list_coherence_warnings(&self, project_id: Uuid) -> Result<Vec<CoherenceWarning>> {
        let conn = self.connect().await?;
        let mut result_rows = conn
            .query(
                "SELECT warning_id, project_id, new_chunk_id, existing_chunk_id, confidence, \
                 conflict_type, explanation, created_at \
                 FROM coherence_warnings WHERE project_id = ? ORDER BY created_at DESC",
                params![project_id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to query coherence warnings", e))?;

        let mut warnings = Vec::new();
        while let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch warning row", e))?
        {
            warnings.push(row_to_coherence_warning(&row)?);
        }
        Ok(warnings)
    }
}
