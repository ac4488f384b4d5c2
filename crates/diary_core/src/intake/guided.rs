//! Guided task intake state machine.
//!
//! # Responsibility
//! - Collect subject, description and deadline offset one message at a time.
//! - Classify difficulty through the gateway and persist the task.
//!
//! # Invariants
//! - Only the administrator may leave `Idle`, and only the participant who
//!   started a session may answer or cancel it.
//! - A rejected answer keeps the current step and persists nothing.
//! - Each answer is applied under the session-map lock. The session is
//!   removed before the classification call, so a task is created at most
//!   once per session whatever the outcome.
//! - A classification failure only degrades difficulty to `Normal`.

use super::session::{ConversationKey, IntakeSession, IntakeStep, SessionFate, SessionStore};
use crate::access::{AdminPolicy, PrivilegedAction};
use crate::ai::EnrichmentGateway;
use crate::db::Store;
use crate::model::task::{validate_subject, NewTask, Task};
use crate::model::user::ExternalId;
use crate::repo::task_repo::SqliteTaskRepository;
use crate::repo::user_repo::SqliteUserRepository;
use crate::service::task_service::TaskService;
use crate::service::user_service::UserService;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SUBJECT_QUESTION: &str = "Which subject is the task for?";
pub const DESCRIPTION_QUESTION: &str = "What needs to be done?";
pub const DEADLINE_QUESTION: &str = "In how many hours is the lesson? (enter a number)";
pub const DEADLINE_RETRY: &str = "Please enter the number of hours as a whole number.";

/// Result of feeding one message to the machine.
#[derive(Debug)]
pub enum IntakeOutcome {
    /// Step accepted; ask the next question.
    Prompt(&'static str),
    /// Answer rejected; the step is unchanged.
    Invalid(String),
    Created(Task),
    /// Persisting failed; the session was discarded.
    Failed(ServiceError),
    /// No live session for this conversation.
    NotActive,
}

pub struct GuidedIntake {
    sessions: SessionStore,
    policy: AdminPolicy,
    gateway: Arc<EnrichmentGateway>,
    store: Store,
}

impl GuidedIntake {
    pub fn new(
        store: Store,
        gateway: Arc<EnrichmentGateway>,
        policy: AdminPolicy,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            sessions: SessionStore::new(idle_ttl),
            policy,
            gateway,
            store,
        }
    }

    /// Starts (or restarts) an intake for `conversation`, owned by `actor`.
    ///
    /// # Errors
    /// `PermissionDenied` when `actor` is not the administrator; no session
    /// is created.
    pub fn begin(&self, conversation: ConversationKey, actor: ExternalId) -> ServiceResult<&'static str> {
        self.policy.require(actor, PrivilegedAction::CreateTask)?;
        self.sessions.put(conversation, IntakeSession::started(actor));
        info!("event=intake_begin module=intake status=ok");
        Ok(SUBJECT_QUESTION)
    }

    /// Discards the session if `actor` started it. Returns whether one was
    /// discarded.
    pub fn cancel(&self, conversation: ConversationKey, actor: ExternalId) -> bool {
        let cancelled = self
            .sessions
            .update(conversation, |session| {
                if session.initiator == actor {
                    (true, SessionFate::Remove)
                } else {
                    (false, SessionFate::Untouched)
                }
            })
            .unwrap_or(false);
        if cancelled {
            info!("event=intake_cancel module=intake status=ok");
        }
        cancelled
    }

    /// Drops sessions idle past the TTL.
    pub fn evict_expired(&self) -> usize {
        self.sessions.evict_expired_at(Instant::now())
    }

    pub fn step(&self, conversation: ConversationKey) -> IntakeStep {
        self.sessions
            .get(conversation)
            .map_or(IntakeStep::Idle, |session| session.step)
    }

    /// Whether `actor` has an intake in progress in `conversation`.
    pub fn is_active_for(&self, conversation: ConversationKey, actor: ExternalId) -> bool {
        self.sessions
            .get(conversation)
            .is_some_and(|session| session.initiator == actor && session.step != IntakeStep::Idle)
    }

    /// Consumes `text` from `sender` as the answer to the current step.
    ///
    /// Messages from anyone but the initiator are not consumed and yield
    /// `NotActive`. The finished task is owned by the initiator.
    pub async fn handle_message(
        &self,
        conversation: ConversationKey,
        sender: ExternalId,
        text: &str,
    ) -> IntakeOutcome {
        let now = Utc::now();
        let transition = self.sessions.update(conversation, |session| {
            if session.initiator != sender {
                return (Transition::NotConsumed, SessionFate::Untouched);
            }
            apply_answer(session, text.trim(), now)
        });

        match transition {
            None | Some(Transition::NotConsumed) => IntakeOutcome::NotActive,
            Some(Transition::Prompt(next, question)) => {
                info!("event=intake_step module=intake status=ok step={}", next.as_str());
                IntakeOutcome::Prompt(question)
            }
            Some(Transition::Invalid(step, reason)) => {
                warn!("event=intake_step module=intake status=invalid step={}", step.as_str());
                IntakeOutcome::Invalid(reason)
            }
            Some(Transition::Ready(session, deadline)) => self.finish(session, deadline).await,
        }
    }

    async fn finish(&self, session: IntakeSession, deadline: DateTime<Utc>) -> IntakeOutcome {
        let owner = session.initiator;
        let subject = session.draft.subject.unwrap_or_default();
        let description = session.draft.description.unwrap_or_default();
        let difficulty = self.gateway.classify_difficulty(&subject, &description).await;

        let policy = self.policy;
        let created = self.store.with_conn(|conn| -> ServiceResult<Task> {
            let users = UserService::new(SqliteUserRepository::try_new(conn)?);
            let owner = users
                .get(owner)?
                .ok_or_else(|| ServiceError::Validation("participant is not registered".into()))?;
            let tasks = TaskService::new(SqliteTaskRepository::try_new(conn)?, policy);
            tasks.create(&NewTask {
                user_id: owner.id,
                subject,
                description,
                deadline,
                difficulty,
                steps: None,
                class_name: owner.class_name,
            })
        });

        match created {
            Ok(task) => {
                info!(
                    "event=intake_finish module=intake status=ok task_id={} difficulty={}",
                    task.id, task.difficulty
                );
                IntakeOutcome::Created(task)
            }
            Err(err) => {
                warn!("event=intake_finish module=intake status=error error={err}");
                IntakeOutcome::Failed(err)
            }
        }
    }
}

/// Effect of one answer on a session.
enum Transition {
    NotConsumed,
    Prompt(IntakeStep, &'static str),
    Invalid(IntakeStep, String),
    /// All fields collected; the session has been removed.
    Ready(IntakeSession, DateTime<Utc>),
}

fn apply_answer(
    session: &mut IntakeSession,
    answer: &str,
    now: DateTime<Utc>,
) -> (Transition, SessionFate) {
    match session.step {
        IntakeStep::Idle => (Transition::NotConsumed, SessionFate::Remove),
        IntakeStep::AwaitingSubject => {
            if let Err(err) = validate_subject(answer) {
                return (
                    Transition::Invalid(session.step, err.to_string()),
                    SessionFate::Keep,
                );
            }
            session.draft.subject = Some(answer.to_string());
            session.step = IntakeStep::AwaitingDescription;
            (
                Transition::Prompt(session.step, DESCRIPTION_QUESTION),
                SessionFate::Keep,
            )
        }
        IntakeStep::AwaitingDescription => {
            session.draft.description = Some(answer.to_string());
            session.step = IntakeStep::AwaitingDeadlineOffset;
            (
                Transition::Prompt(session.step, DEADLINE_QUESTION),
                SessionFate::Keep,
            )
        }
        IntakeStep::AwaitingDeadlineOffset => match deadline_from_offset(answer, now) {
            Ok(deadline) => {
                session.draft.deadline = Some(deadline);
                (
                    Transition::Ready(session.clone(), deadline),
                    SessionFate::Remove,
                )
            }
            Err(reason) => (Transition::Invalid(session.step, reason), SessionFate::Keep),
        },
    }
}

/// Parses a whole number of hours and adds it to `now`.
pub fn deadline_from_offset(answer: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let hours: i64 = answer.trim().parse().map_err(|_| DEADLINE_RETRY.to_string())?;
    if hours < 0 {
        return Err("The number of hours cannot be negative.".to_string());
    }
    TimeDelta::try_hours(hours)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| "That deadline is too far in the future.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_offset_accepts_whole_hours() {
        let now = Utc::now();
        assert_eq!(deadline_from_offset(" 2 ", now), Ok(now + TimeDelta::hours(2)));
        assert_eq!(deadline_from_offset("0", now), Ok(now));
    }

    #[test]
    fn deadline_offset_rejects_bad_input() {
        let now = Utc::now();
        assert_eq!(deadline_from_offset("soon", now), Err(DEADLINE_RETRY.to_string()));
        assert!(deadline_from_offset("1.5", now).is_err());
        assert!(deadline_from_offset("-3", now).is_err());
        assert!(deadline_from_offset(&i64::MAX.to_string(), now).is_err());
    }
}
