//! Transport-neutral assistant facade.
//!
//! # Responsibility
//! - Resolve the sender of every inbound event to a durable user.
//! - Route the event to the task lifecycle, intake, mood or gateway path.
//! - Render the result as plain text plus optional structured choices.
//!
//! # Invariants
//! - Every event yields a reply; store failures become a user-visible
//!   message, AI failures a classified message.
//! - Privileged events are rejected before any store mutation.
//! - Per-task actions (complete, steps, materials) only see the sender's
//!   own tasks.
//! - Free text goes to the intake session when one is active for the
//!   conversation, otherwise to the gateway.

use crate::access::{AdminPolicy, PrivilegedAction};
use crate::ai::gateway::DEFAULT_SYSTEM_PROMPT;
use crate::ai::EnrichmentGateway;
use crate::config::AppConfig;
use crate::db::{DbError, Store};
use crate::intake::guided::deadline_from_offset;
use crate::intake::{ConversationKey, GuidedIntake, IntakeOutcome, TextIntake};
use crate::model::mood::Mood;
use crate::model::progression::{achievement_title, ProgressSummary};
use crate::model::task::{Difficulty, NewTask, Task, TaskId};
use crate::model::user::{ExternalId, User, CLASS_NAMES};
use crate::repo::mood_repo::SqliteMoodRepository;
use crate::repo::task_repo::{CompletionOutcome, SqliteTaskRepository};
use crate::repo::user_repo::SqliteUserRepository;
use crate::service::mood_service::{MoodService, RECENT_MOODS_LIMIT};
use crate::service::task_service::TaskService;
use crate::service::user_service::UserService;
use crate::service::{ServiceError, ServiceResult};
use chrono::{Local, Utc};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

const STORE_UNAVAILABLE_TEXT: &str = "⚠️ The diary is temporarily unavailable. Please try again later.";
const PERMISSION_DENIED_TEXT: &str = "⛔ You don't have administrator rights!";
const TASK_NOT_FOUND_TEXT: &str = "Task not found.";

/// One inbound event from a chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: ExternalId,
    pub conversation: ConversationKey,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Event in a private chat, where the conversation key is the sender id.
    pub fn private(sender: ExternalId, kind: EventKind) -> Self {
        Self {
            sender,
            conversation: sender,
            username: None,
            full_name: None,
            kind,
        }
    }
}

/// What the participant asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Start,
    ChooseClass(String),
    ListTasks,
    CompleteTask(TaskId),
    DeleteTask(TaskId),
    EditSubject { task_id: TaskId, subject: String },
    EditDescription { task_id: TaskId, description: String },
    /// New deadline as a number of hours from now.
    EditDeadline { task_id: TaskId, hours: String },
    BeginIntake,
    CancelIntake,
    Stats,
    Achievements,
    LogMood { mood: Mood, load_level: u8 },
    RecentMoods,
    Materials(TaskId),
    Steps(TaskId),
    /// One-shot free-text task creation.
    QuickAdd(String),
    Text(String),
}

impl EventKind {
    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ChooseClass(_) => "choose_class",
            Self::ListTasks => "list_tasks",
            Self::CompleteTask(_) => "complete_task",
            Self::DeleteTask(_) => "delete_task",
            Self::EditSubject { .. } => "edit_subject",
            Self::EditDescription { .. } => "edit_description",
            Self::EditDeadline { .. } => "edit_deadline",
            Self::BeginIntake => "begin_intake",
            Self::CancelIntake => "cancel_intake",
            Self::Stats => "stats",
            Self::Achievements => "achievements",
            Self::LogMood { .. } => "log_mood",
            Self::RecentMoods => "recent_moods",
            Self::Materials(_) => "materials",
            Self::Steps(_) => "steps",
            Self::QuickAdd(_) => "quick_add",
            Self::Text(_) => "text",
        }
    }

    /// Decodes a [`Choice::payload`] back into an event.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let (action, arg) = payload.split_once(':')?;
        let task_id = || arg.parse::<TaskId>().ok();
        match action {
            "class" => Some(Self::ChooseClass(arg.to_string())),
            "done" => task_id().map(Self::CompleteTask),
            "del" => task_id().map(Self::DeleteTask),
            "steps" => task_id().map(Self::Steps),
            "mats" => task_id().map(Self::Materials),
            _ => None,
        }
    }
}

/// A selectable option attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub payload: String,
}

impl Choice {
    fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }
}

/// Startup failures of [`Assistant::from_config`].
#[derive(Debug, thiserror::Error)]
pub enum AssistantInitError {
    #[error("failed to open store: {0}")]
    Store(#[from] DbError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Wires the store, gateway and intake machines behind one entry point.
pub struct Assistant {
    store: Store,
    gateway: Arc<EnrichmentGateway>,
    policy: AdminPolicy,
    intake: GuidedIntake,
    text_intake: TextIntake,
}

impl Assistant {
    pub fn new(
        store: Store,
        gateway: Arc<EnrichmentGateway>,
        policy: AdminPolicy,
        intake_idle_ttl: Duration,
    ) -> Self {
        Self {
            intake: GuidedIntake::new(store.clone(), Arc::clone(&gateway), policy, intake_idle_ttl),
            text_intake: TextIntake::new(Arc::clone(&gateway)),
            store,
            gateway,
            policy,
        }
    }

    /// Opens the configured store and builds the provider tiers.
    pub fn from_config(config: &AppConfig) -> Result<Self, AssistantInitError> {
        let store = Store::open(&config.database_path)?;
        let gateway = Arc::new(EnrichmentGateway::from_config(&config.ai, &config.search)?);
        Ok(Self::new(
            store,
            gateway,
            AdminPolicy::new(config.admin_external_id),
            config.intake.session_idle_ttl(),
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Drops idle intake sessions. Returns how many were dropped.
    pub fn evict_idle_sessions(&self) -> usize {
        self.intake.evict_expired()
    }

    /// Handles one inbound event.
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let kind_name = event.kind.name();
        let user = match self.users(|users| {
            users.resolve_or_create(
                event.sender,
                event.username.as_deref(),
                event.full_name.as_deref(),
            )
        }) {
            Ok(user) => user,
            Err(err) => {
                warn!("event=assistant_event module=assistant status=error kind={kind_name} stage=resolve error={err}");
                return error_reply(&err);
            }
        };

        let reply = self.dispatch(&user, event).await;
        info!("event=assistant_event module=assistant status=ok kind={kind_name}");
        reply
    }

    async fn dispatch(&self, user: &User, event: InboundEvent) -> Reply {
        let sender = event.sender;
        let conversation = event.conversation;
        match event.kind {
            EventKind::Start => self.start(user),
            EventKind::ChooseClass(class_name) => self.choose_class(sender, &class_name),
            EventKind::ListTasks => self.list_tasks(user),
            EventKind::CompleteTask(task_id) => self.complete(user, task_id),
            EventKind::DeleteTask(task_id) => reply_flag(
                self.tasks(|tasks| tasks.delete(sender, task_id)),
                "🗑️ Deleted!",
            ),
            EventKind::EditSubject { task_id, subject } => reply_flag(
                self.tasks(|tasks| tasks.update_subject(sender, task_id, &subject)),
                "✏️ Subject updated.",
            ),
            EventKind::EditDescription {
                task_id,
                description,
            } => reply_flag(
                self.tasks(|tasks| tasks.update_description(sender, task_id, &description)),
                "✏️ Description updated.",
            ),
            EventKind::EditDeadline { task_id, hours } => self.edit_deadline(sender, task_id, &hours),
            EventKind::BeginIntake => match self.intake.begin(conversation, sender) {
                Ok(question) => Reply::text(question),
                Err(err) => error_reply(&err),
            },
            EventKind::CancelIntake => {
                if self.intake.cancel(conversation, sender) {
                    Reply::text("Task creation cancelled.")
                } else {
                    Reply::text("Nothing to cancel.")
                }
            }
            EventKind::Stats => self.stats(user),
            EventKind::Achievements => Reply::text(format!(
                "🏆 Your achievements:\n\nLevel {}\n{}",
                user.level,
                achievement_title(user.xp)
            )),
            EventKind::LogMood { mood, load_level } => {
                match self.moods(|moods| moods.add_mood(user.id, mood, load_level)) {
                    Ok(_) => Reply::text(format!("Mood saved: {} (load {load_level}/10).", mood.as_str())),
                    Err(err) => error_reply(&err),
                }
            }
            EventKind::RecentMoods => self.recent_moods(user),
            EventKind::Materials(task_id) => self.materials(user, task_id).await,
            EventKind::Steps(task_id) => self.steps(user, task_id).await,
            EventKind::QuickAdd(text) => self.quick_add(user, &text).await,
            EventKind::Text(text) => self.text(user, conversation, &text).await,
        }
    }

    fn start(&self, user: &User) -> Reply {
        let greeting = format!("Hi, {}! I am your school diary assistant.", user.display_name());
        match &user.class_name {
            Some(class_name) => Reply::text(format!("{greeting}\nYour class: {class_name}.")),
            None => Reply::text(format!("{greeting}\nPick your class:")).with_choices(
                CLASS_NAMES
                    .iter()
                    .map(|name| Choice::new(*name, format!("class:{name}")))
                    .collect(),
            ),
        }
    }

    fn choose_class(&self, sender: ExternalId, class_name: &str) -> Reply {
        match self.users(|users| users.set_class(sender, class_name)) {
            Ok(Some(user)) => Reply::text(format!(
                "Class {} saved.",
                user.class_name.as_deref().unwrap_or(class_name)
            )),
            Ok(None) => Reply::text(STORE_UNAVAILABLE_TEXT),
            Err(err) => error_reply(&err),
        }
    }

    fn list_tasks(&self, user: &User) -> Reply {
        let tasks = match self.tasks(|tasks| tasks.list_active(user.id, true)) {
            Ok(tasks) => tasks,
            Err(err) => return error_reply(&err),
        };
        if tasks.is_empty() {
            return Reply::text("You have no active tasks. Take a rest! 🥳");
        }

        let is_admin = self.policy.is_admin(user.external_id);
        let mut choices = Vec::new();
        let cards: Vec<String> = tasks
            .iter()
            .map(|task| {
                choices.push(Choice::new(format!("✅ Done #{}", task.id), format!("done:{}", task.id)));
                choices.push(Choice::new(format!("🤖 Steps #{}", task.id), format!("steps:{}", task.id)));
                choices.push(Choice::new(format!("📚 Materials #{}", task.id), format!("mats:{}", task.id)));
                if is_admin {
                    choices.push(Choice::new(format!("🗑️ Delete #{}", task.id), format!("del:{}", task.id)));
                }
                task_card(task)
            })
            .collect();
        Reply::text(cards.join("\n\n")).with_choices(choices)
    }

    fn complete(&self, user: &User, task_id: TaskId) -> Reply {
        let outcome = self.tasks(|tasks| match tasks.get(task_id)? {
            Some(task) if task.user_id == user.id => tasks.complete_detailed(task_id),
            _ => Ok(CompletionOutcome::NotFound),
        });
        match outcome {
            Ok(CompletionOutcome::Completed {
                awarded_xp, owner, ..
            }) => Reply::text(format!(
                "Well done! +{awarded_xp} XP 🌟 Level {}, {} XP total.",
                owner.level, owner.xp
            )),
            Ok(CompletionOutcome::AlreadyCompleted) => Reply::text("This task is already completed."),
            Ok(CompletionOutcome::NotFound) => Reply::text(TASK_NOT_FOUND_TEXT),
            Err(err) => error_reply(&err),
        }
    }

    fn edit_deadline(&self, sender: ExternalId, task_id: TaskId, hours: &str) -> Reply {
        if let Err(err) = self.policy.require(sender, PrivilegedAction::EditTask) {
            return error_reply(&err);
        }
        let deadline = match deadline_from_offset(hours, Utc::now()) {
            Ok(deadline) => deadline,
            Err(reason) => return Reply::text(reason),
        };
        reply_flag(
            self.tasks(|tasks| tasks.update_deadline(sender, task_id, deadline)),
            "⏰ Deadline updated.",
        )
    }

    fn stats(&self, user: &User) -> Reply {
        match self.tasks(|tasks| tasks.list_active(user.id, true)) {
            Ok(active) => {
                let summary = ProgressSummary::new(user.xp, active.len());
                Reply::text(format!(
                    "📊 Your stats:\n\nLevel: {}\nXP: {}\nActive tasks: {}",
                    summary.level, summary.xp, summary.active_tasks
                ))
            }
            Err(err) => error_reply(&err),
        }
    }

    fn recent_moods(&self, user: &User) -> Reply {
        match self.moods(|moods| moods.recent_moods(user.id, RECENT_MOODS_LIMIT)) {
            Ok(entries) if entries.is_empty() => Reply::text("No mood entries yet."),
            Ok(entries) => Reply::text(
                entries
                    .iter()
                    .map(|entry| {
                        format!(
                            "{} {} (load {}/10)",
                            entry.created_at.with_timezone(&Local).format("%d.%m %H:%M"),
                            entry.mood.as_str(),
                            entry.load_level
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(err) => error_reply(&err),
        }
    }

    async fn materials(&self, user: &User, task_id: TaskId) -> Reply {
        let task = match self.find_own_task(user, task_id) {
            Ok(task) => task,
            Err(reply) => return reply,
        };
        match self.gateway.find_materials(&task_prompt_text(&task)).await {
            Ok(text) => Reply::text(format!("📚 Study materials:\n\n{text}")),
            Err(failure) => Reply::text(failure.user_message()),
        }
    }

    async fn steps(&self, user: &User, task_id: TaskId) -> Reply {
        let task = match self.find_own_task(user, task_id) {
            Ok(task) => task,
            Err(reply) => return reply,
        };
        match self.gateway.plan_steps(&task_prompt_text(&task)).await {
            Ok(plan) => {
                if let Err(err) = self.tasks(|tasks| tasks.attach_steps(task_id, &plan)) {
                    warn!("event=attach_steps module=assistant status=error error={err}");
                }
                Reply::text(format!("📋 Plan:\n\n{plan}"))
            }
            Err(failure) => Reply::text(failure.user_message()),
        }
    }

    async fn quick_add(&self, user: &User, text: &str) -> Reply {
        if let Err(err) = self.policy.require(user.external_id, PrivilegedAction::CreateTask) {
            return error_reply(&err);
        }
        let (confirmation, parsed) = self.text_intake.handle(text).await;
        let created = self.tasks(|tasks| {
            tasks.create(&NewTask {
                user_id: user.id,
                subject: parsed.subject,
                description: parsed.description,
                deadline: parsed.deadline,
                difficulty: Difficulty::Normal,
                steps: Some(parsed.steps),
                class_name: user.class_name.clone(),
            })
        });
        match created {
            Ok(_) => Reply::text(confirmation),
            Err(err) => error_reply(&err),
        }
    }

    async fn text(&self, user: &User, conversation: ConversationKey, text: &str) -> Reply {
        if self.intake.is_active_for(conversation, user.external_id) {
            match self.intake.handle_message(conversation, user.external_id, text).await {
                IntakeOutcome::Prompt(question) => return Reply::text(question),
                IntakeOutcome::Invalid(reason) => return Reply::text(reason),
                IntakeOutcome::Created(task) => {
                    return Reply::text(format!("✅ Task added! Difficulty: {}", task.difficulty))
                }
                IntakeOutcome::Failed(err) => return error_reply(&err),
                IntakeOutcome::NotActive => {}
            }
        }
        match self.gateway.respond(text, DEFAULT_SYSTEM_PROMPT, false).await {
            Ok(answer) => Reply::text(answer),
            Err(failure) => Reply::text(failure.user_message()),
        }
    }

    /// Loads a task of `user`. Other participants' tasks read as missing.
    fn find_own_task(&self, user: &User, task_id: TaskId) -> Result<Task, Reply> {
        match self.tasks(|tasks| tasks.get(task_id)) {
            Ok(Some(task)) if task.user_id == user.id => Ok(task),
            Ok(_) => Err(Reply::text(TASK_NOT_FOUND_TEXT)),
            Err(err) => Err(error_reply(&err)),
        }
    }

    fn users<T>(&self, op: impl FnOnce(&UserService<SqliteUserRepository<'_>>) -> ServiceResult<T>) -> ServiceResult<T> {
        self.store.with_conn(|conn| {
            let service = UserService::new(SqliteUserRepository::try_new(conn)?);
            op(&service)
        })
    }

    fn tasks<T>(&self, op: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> ServiceResult<T>) -> ServiceResult<T> {
        let policy = self.policy;
        self.store.with_conn(|conn| {
            let service = TaskService::new(SqliteTaskRepository::try_new(conn)?, policy);
            op(&service)
        })
    }

    fn moods<T>(&self, op: impl FnOnce(&MoodService<SqliteMoodRepository<'_>>) -> ServiceResult<T>) -> ServiceResult<T> {
        self.store.with_conn(|conn| {
            let service = MoodService::new(SqliteMoodRepository::try_new(conn)?);
            op(&service)
        })
    }
}

fn task_card(task: &Task) -> String {
    format!(
        "{} #{} {}\n{}\n⏰ Due: {}",
        task.difficulty.badge(),
        task.id,
        task.subject,
        task.description,
        task.deadline.with_timezone(&Local).format("%d.%m %H:%M")
    )
}

fn task_prompt_text(task: &Task) -> String {
    format!("{}: {}", task.subject, task.description)
}

fn reply_flag(result: ServiceResult<bool>, success: &str) -> Reply {
    match result {
        Ok(true) => Reply::text(success),
        Ok(false) => Reply::text(TASK_NOT_FOUND_TEXT),
        Err(err) => error_reply(&err),
    }
}

fn error_reply(err: &ServiceError) -> Reply {
    match err {
        ServiceError::StoreUnavailable(_) => Reply::text(STORE_UNAVAILABLE_TEXT),
        ServiceError::PermissionDenied { .. } => Reply::text(PERMISSION_DENIED_TEXT),
        ServiceError::Validation(message) => Reply::text(format!("⚠️ {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_round_trip_to_events() {
        assert_eq!(EventKind::from_payload("done:12"), Some(EventKind::CompleteTask(12)));
        assert_eq!(EventKind::from_payload("mats:3"), Some(EventKind::Materials(3)));
        assert_eq!(
            EventKind::from_payload("class:7А"),
            Some(EventKind::ChooseClass("7А".into()))
        );
        assert_eq!(EventKind::from_payload("done:x"), None);
        assert_eq!(EventKind::from_payload("unknown"), None);
    }
}
