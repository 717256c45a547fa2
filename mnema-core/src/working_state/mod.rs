//! Working state: the task/question/goal machinery the agent loop runs on.
//!
//! Tasks move `ready → in_progress → done`, detouring through `blocked`
//! whenever an open question or unfinished dependency holds them. Blocking
//! is never stored ambiguously: a task is `blocked` exactly when its
//! `blocked_by` has an open question or a dependency is not done, and every
//! transition that could release tasks re-checks them in the same
//! transaction.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::{EventBus, MemoryEvent};
use crate::storage::StorageBackend;
use crate::types::{
    Activity, Goal, PendingGoal, Question, QuestionStatus, Task, TaskStatus,
};

/// Task, question, and goal operations for one storage backend.
pub struct WorkingState {
    storage: Arc<dyn StorageBackend>,
    events: EventBus,
}

impl WorkingState {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, events: EventBus) -> Self {
        Self { storage, events }
    }

    /// Ids of all `done` tasks in a project.
    async fn done_task_ids(&self, project_id: Uuid) -> Result<BTreeSet<Uuid>> {
        Ok(self
            .storage
            .list_tasks(project_id, Some(TaskStatus::Done))
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    /// Create a task. Starts `blocked` when any named dependency is not yet
    /// done, otherwise `ready`.
    pub async fn create_task(
        &self,
        project_id: Uuid,
        title: &str,
        description: &str,
        skill_area: Option<String>,
        depends_on: BTreeSet<Uuid>,
    ) -> Result<Task> {
        let done = self.done_task_ids(project_id).await?;
        let mut task = Task::new(
            project_id,
            title.to_string(),
            description.to_string(),
            skill_area,
            depends_on,
        );
        if !task.depends_on.is_subset(&done) {
            task.status = TaskStatus::Blocked;
        }

        self.storage.insert_task(&task).await?;
        self.log(project_id, "task_created", json!({ "task_id": task.id, "title": title }))
            .await?;
        debug!(task = %task.id, status = %task.status, "task created");
        Ok(task)
    }

    /// Move a task to `in_progress`.
    pub async fn begin_task(&self, task_id: Uuid) -> Result<Task> {
        let mut task = self.require_task(task_id).await?;
        if task.status != TaskStatus::Ready {
            return Err(Error::InvalidState(format!(
                "task {task_id} is {}, only ready tasks can begin",
                task.status
            )));
        }
        let from = task.status;
        task.status = TaskStatus::InProgress;
        task.started_at = Some(Utc::now());
        task.updated_at = Utc::now();
        self.storage.update_task(&task).await?;
        self.emit_transition(&task, from);
        Ok(task)
    }

    /// Complete a task and promote everything it was holding back, in one
    /// transaction.
    pub async fn complete_task(&self, task_id: Uuid, outcome: Option<String>) -> Result<Task> {
        let mut task = self.require_task(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Done;
        task.outcome = outcome;
        task.completed_at = Some(Utc::now());
        task.updated_at = Utc::now();
        clear_failure(&mut task);

        let unblocked = self.unblock_candidates(task.project_id, Some(task.id)).await?;
        let mut batch = vec![task.clone()];
        batch.extend(unblocked.iter().cloned());
        self.storage.update_tasks(&batch).await?;

        self.emit_transition(&task, from);
        for t in &unblocked {
            self.emit_transition(t, TaskStatus::Blocked);
        }
        self.log(
            task.project_id,
            "task_completed",
            json!({ "task_id": task.id, "unblocked": unblocked.len() }),
        )
        .await?;
        info!(task = %task.id, unblocked = unblocked.len(), "task completed");
        Ok(task)
    }

    /// Cancel a task.
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<Task> {
        let mut task = self.require_task(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Cancelled;
        task.updated_at = Utc::now();
        self.storage.update_task(&task).await?;
        self.emit_transition(&task, from);
        self.log(task.project_id, "task_cancelled", json!({ "task_id": task.id }))
            .await?;
        Ok(task)
    }

    /// Record a task failure with its structured context. The task stays
    /// visible as `failed`; re-attempting requires an explicit reset to
    /// `ready`.
    pub async fn fail_task(
        &self,
        task_id: Uuid,
        reason: &str,
        failure_context: Option<serde_json::Value>,
    ) -> Result<Task> {
        let mut task = self.require_task(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Failed;
        task.failed_at = Some(Utc::now());
        task.failure_reason = Some(reason.to_string());
        task.failure_context = failure_context;
        task.updated_at = Utc::now();
        self.storage.update_task(&task).await?;
        self.emit_transition(&task, from);
        self.log(
            task.project_id,
            "task_failed",
            json!({ "task_id": task.id, "reason": reason }),
        )
        .await?;
        Ok(task)
    }

    /// Reset a task to `ready` for an explicit retry, clearing failure state.
    pub async fn reset_task(&self, task_id: Uuid) -> Result<Task> {
        let mut task = self.require_task(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Ready;
        task.updated_at = Utc::now();
        clear_failure(&mut task);
        self.storage.update_task(&task).await?;
        self.emit_transition(&task, from);
        Ok(task)
    }

    /// Tasks the prioritizer may pick from.
    pub async fn ready_tasks(&self, project_id: Uuid) -> Result<Vec<Task>> {
        self.storage
            .list_tasks(project_id, Some(TaskStatus::Ready))
            .await
    }

    /// Tasks currently held back.
    pub async fn blocked_tasks(&self, project_id: Uuid) -> Result<Vec<Task>> {
        self.storage
            .list_tasks(project_id, Some(TaskStatus::Blocked))
            .await
    }

    /// Ask a blocking question: every listed task gains the question in its
    /// `blocked_by` and drops to `blocked`.
    pub async fn create_question(
        &self,
        project_id: Uuid,
        text: &str,
        context: Option<String>,
        blocks_tasks: Vec<Uuid>,
    ) -> Result<Question> {
        let question = Question::new(project_id, text.to_string(), context, blocks_tasks.clone());
        self.storage.insert_question(&question).await?;

        let mut updated = Vec::new();
        for task_id in &blocks_tasks {
            let mut task = self.require_task(*task_id).await?;
            let from = task.status;
            task.blocked_by.insert(question.id);
            task.status = TaskStatus::Blocked;
            task.updated_at = Utc::now();
            updated.push((task, from));
        }
        let batch: Vec<Task> = updated.iter().map(|(t, _)| t.clone()).collect();
        if !batch.is_empty() {
            self.storage.update_tasks(&batch).await?;
        }
        for (task, from) in &updated {
            if *from != TaskStatus::Blocked {
                self.emit_transition(task, *from);
            }
        }

        self.events
            .publish(MemoryEvent::QuestionAsked { id: question.id });
        self.log(
            project_id,
            "question_asked",
            json!({ "question_id": question.id, "blocks": blocks_tasks }),
        )
        .await?;
        Ok(question)
    }

    /// Answer a question. Every task whose `blocked_by` empties and whose
    /// dependencies are all done flips to `ready` in the same transaction.
    pub async fn answer_question(&self, question_id: Uuid, answer: &str) -> Result<Question> {
        let mut question = self
            .storage
            .get_question(question_id)
            .await?
            .ok_or(Error::NotFound(question_id))?;
        if question.status == QuestionStatus::Answered {
            return Err(Error::InvalidState(format!(
                "question {question_id} is already answered"
            )));
        }

        question.status = QuestionStatus::Answered;
        question.answer = Some(answer.to_string());
        question.answered_at = Some(Utc::now());

        let done = self.done_task_ids(question.project_id).await?;
        let mut released = Vec::new();
        for task in self
            .storage
            .list_tasks(question.project_id, Some(TaskStatus::Blocked))
            .await?
        {
            if !task.blocked_by.contains(&question.id) {
                continue;
            }
            let mut task = task;
            task.blocked_by.remove(&question.id);
            task.updated_at = Utc::now();
            if task.is_satisfied(&done) {
                task.status = TaskStatus::Ready;
                clear_failure(&mut task);
            }
            released.push(task);
        }

        self.storage.answer_question(&question, &released).await?;

        self.events
            .publish(MemoryEvent::QuestionAnswered { id: question.id });
        for task in released.iter().filter(|t| t.status == TaskStatus::Ready) {
            self.emit_transition(task, TaskStatus::Blocked);
        }
        self.log(
            question.project_id,
            "question_answered",
            json!({ "question_id": question.id }),
        )
        .await?;
        Ok(question)
    }

    /// Open questions for a project.
    pub async fn open_questions(&self, project_id: Uuid) -> Result<Vec<Question>> {
        self.storage
            .list_questions(project_id, Some(QuestionStatus::Open))
            .await
    }

    /// Activate a new goal, completing the prior active goal.
    pub async fn set_goal(&self, project_id: Uuid, goal_text: &str) -> Result<Goal> {
        let goal = Goal::new(project_id, goal_text.to_string());
        let prior = match self.storage.get_active_goal(project_id).await? {
            Some(mut prior) => {
                prior.active = false;
                prior.completed_at = Some(Utc::now());
                prior.outcome = Some("replaced by new goal".to_string());
                Some(prior)
            }
            None => None,
        };
        self.storage.set_goal(&goal, prior.as_ref()).await?;
        self.events.publish(MemoryEvent::GoalSet { id: goal.id });
        self.log(project_id, "goal_set", json!({ "goal_id": goal.id, "text": goal_text }))
            .await?;
        Ok(goal)
    }

    /// Queue a goal for activation after the current cycle ends.
    pub async fn queue_goal(&self, project_id: Uuid, goal_text: &str) -> Result<()> {
        self.storage
            .set_pending_goal(&PendingGoal {
                project_id,
                goal_text: goal_text.to_string(),
                queued_at: Utc::now(),
            })
            .await
    }

    /// Apply the pending goal, if one is queued. Called at cycle end.
    pub async fn apply_pending_goal(&self, project_id: Uuid) -> Result<Option<Goal>> {
        match self.storage.take_pending_goal(project_id).await? {
            Some(pending) => Ok(Some(self.set_goal(project_id, &pending.goal_text).await?)),
            None => Ok(None),
        }
    }

    /// Most recent activity rows, newest first.
    pub async fn recent_activity(&self, project_id: Uuid, limit: usize) -> Result<Vec<Activity>> {
        self.storage.recent_activities(project_id, limit).await
    }

    /// Blocked tasks that would be satisfied once `just_done` completes.
    async fn unblock_candidates(
        &self,
        project_id: Uuid,
        just_done: Option<Uuid>,
    ) -> Result<Vec<Task>> {
        let mut done = self.done_task_ids(project_id).await?;
        if let Some(id) = just_done {
            done.insert(id);
        }

        let mut released = Vec::new();
        for task in self
            .storage
            .list_tasks(project_id, Some(TaskStatus::Blocked))
            .await?
        {
            if task.is_satisfied(&done) {
                let mut task = task;
                task.status = TaskStatus::Ready;
                task.updated_at = Utc::now();
                clear_failure(&mut task);
                released.push(task);
            }
        }
        Ok(released)
    }

    async fn require_task(&self, task_id: Uuid) -> Result<Task> {
        self.storage
            .get_task(task_id)
            .await?
            .ok_or(Error::NotFound(task_id))
    }

    fn emit_transition(&self, task: &Task, from: TaskStatus) {
        if from != task.status {
            self.events.publish(MemoryEvent::TaskStateChanged {
                id: task.id,
                from,
                to: task.status,
            });
        }
    }

    async fn log(&self, project_id: Uuid, action: &str, details: serde_json::Value) -> Result<()> {
        self.storage
            .log_activity(&Activity::new(project_id, action, details))
            .await
    }
}

/// Failure fields are cleared whenever a task lands on `ready` or `done`.
fn clear_failure(task: &mut Task) {
    task.failed_at = None;
    task.failure_reason = None;
    task.failure_context = None;
}
