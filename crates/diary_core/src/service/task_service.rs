//! Task lifecycle use-case service.
//!
//! # Responsibility
//! - Create, list, complete, delete and edit tasks.
//! - Gate destructive and edit operations behind the administrator policy.
//!
//! # Invariants
//! - `complete` never double-credits: the second call on the same task is a
//!   no-op that returns `false`.
//! - Privileged calls by non-administrators perform no store access at all.

use super::{found, ServiceResult};
use crate::access::{AdminPolicy, PrivilegedAction};
use crate::model::task::{NewTask, Task, TaskId};
use crate::model::user::{ExternalId, UserId};
use crate::repo::task_repo::{CompletionOutcome, TaskListQuery, TaskRepository};
use chrono::{DateTime, Utc};
use log::info;

/// Use-case service for the task lifecycle.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    policy: AdminPolicy,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R, policy: AdminPolicy) -> Self {
        Self { repo, policy }
    }

    /// Persists a new task. Callers are responsible for gating creation.
    pub fn create(&self, task: &NewTask) -> ServiceResult<Task> {
        let created = self.repo.create_task(task)?;
        info!(
            "event=task_create module=service status=ok task_id={} difficulty={}",
            created.id, created.difficulty
        );
        Ok(created)
    }

    pub fn get(&self, task_id: TaskId) -> ServiceResult<Option<Task>> {
        Ok(self.repo.get_task(task_id)?)
    }

    /// Lists the owner's tasks ordered by deadline.
    pub fn list_active(&self, user_id: UserId, only_active: bool) -> ServiceResult<Vec<Task>> {
        Ok(self.repo.list_tasks(&TaskListQuery {
            only_active,
            ..TaskListQuery::active_for(user_id)
        })?)
    }

    /// Completes a task and credits its owner.
    ///
    /// Returns `false` when the task is missing or already completed.
    pub fn complete(&self, task_id: TaskId) -> ServiceResult<bool> {
        Ok(matches!(
            self.complete_detailed(task_id)?,
            CompletionOutcome::Completed { .. }
        ))
    }

    /// Like [`Self::complete`] but reports the award and the updated owner.
    pub fn complete_detailed(&self, task_id: TaskId) -> ServiceResult<CompletionOutcome> {
        let outcome = self.repo.complete_task(task_id)?;
        match &outcome {
            CompletionOutcome::Completed {
                awarded_xp, owner, ..
            } => info!(
                "event=task_complete module=service status=ok task_id={task_id} awarded_xp={awarded_xp} level={}",
                owner.level
            ),
            CompletionOutcome::AlreadyCompleted => info!(
                "event=task_complete module=service status=noop reason=already_completed task_id={task_id}"
            ),
            CompletionOutcome::NotFound => info!(
                "event=task_complete module=service status=noop reason=not_found task_id={task_id}"
            ),
        }
        Ok(outcome)
    }

    /// Deletes a task. Administrator only.
    pub fn delete(&self, actor: ExternalId, task_id: TaskId) -> ServiceResult<bool> {
        self.policy.require(actor, PrivilegedAction::DeleteTask)?;
        found(self.repo.delete_task(task_id))
    }

    pub fn update_subject(
        &self,
        actor: ExternalId,
        task_id: TaskId,
        subject: &str,
    ) -> ServiceResult<bool> {
        self.policy.require(actor, PrivilegedAction::EditTask)?;
        found(self.repo.update_subject(task_id, subject))
    }

    pub fn update_description(
        &self,
        actor: ExternalId,
        task_id: TaskId,
        description: &str,
    ) -> ServiceResult<bool> {
        self.policy.require(actor, PrivilegedAction::EditTask)?;
        found(self.repo.update_description(task_id, description))
    }

    pub fn update_deadline(
        &self,
        actor: ExternalId,
        task_id: TaskId,
        deadline: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        self.policy.require(actor, PrivilegedAction::EditTask)?;
        found(self.repo.update_deadline(task_id, deadline))
    }

    /// Caches an AI-generated plan on the task. Not privileged: any viewer
    /// may request a plan.
    pub fn attach_steps(&self, task_id: TaskId, steps: &str) -> ServiceResult<bool> {
        found(self.repo.update_steps(task_id, steps))
    }
}
