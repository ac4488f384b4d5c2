//! Keyed store for guided-intake sessions.
//!
//! # Invariants
//! - At most one session per conversation key.
//! - A session idle for longer than the TTL is treated as absent and
//!   removed on the next access.
//! - A session belongs to the participant who started it.
//! - The lock is held only for map operations, never across `.await`.

use crate::model::user::ExternalId;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Identifier of the conversation a session belongs to.
pub type ConversationKey = i64;

/// Current step of a guided intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeStep {
    #[default]
    Idle,
    AwaitingSubject,
    AwaitingDescription,
    AwaitingDeadlineOffset,
}

impl IntakeStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingSubject => "awaiting_subject",
            Self::AwaitingDescription => "awaiting_description",
            Self::AwaitingDeadlineOffset => "awaiting_deadline_offset",
        }
    }
}

/// Fields accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntakeDraft {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

/// One in-flight intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSession {
    /// Participant who started the intake and will own the task.
    pub initiator: ExternalId,
    pub step: IntakeStep,
    pub draft: IntakeDraft,
}

impl IntakeSession {
    pub fn started(initiator: ExternalId) -> Self {
        Self {
            initiator,
            step: IntakeStep::AwaitingSubject,
            draft: IntakeDraft::default(),
        }
    }
}

/// What [`SessionStore::update`] does with the session afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFate {
    /// Keep the edited session and refresh its TTL.
    Keep,
    /// Keep the session as it was, TTL untouched.
    Untouched,
    Remove,
}

#[derive(Debug)]
struct Entry {
    session: IntakeSession,
    touched_at: Instant,
}

/// In-memory session map with idle expiry.
#[derive(Debug)]
pub struct SessionStore {
    entries: Mutex<HashMap<ConversationKey, Entry>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Returns a copy of the live session for `key`.
    pub fn get(&self, key: ConversationKey) -> Option<IntakeSession> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: ConversationKey, now: Instant) -> Option<IntakeSession> {
        let mut entries = self.lock();
        match entries.get(&key) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(&key);
                info!("event=intake_session module=intake status=expired");
                None
            }
            Some(entry) => Some(entry.session.clone()),
            None => None,
        }
    }

    /// Inserts or replaces the session for `key` and refreshes its TTL.
    pub fn put(&self, key: ConversationKey, session: IntakeSession) {
        self.put_at(key, session, Instant::now());
    }

    pub fn put_at(&self, key: ConversationKey, session: IntakeSession, now: Instant) {
        debug!(
            "event=intake_session module=intake status=put step={}",
            session.step.as_str()
        );
        self.lock().insert(
            key,
            Entry {
                session,
                touched_at: now,
            },
        );
    }

    /// Runs `edit` on the live session for `key` under the map lock.
    ///
    /// Returns `None` when there is no live session. Edits made under
    /// [`SessionFate::Untouched`] are discarded.
    pub fn update<R>(
        &self,
        key: ConversationKey,
        edit: impl FnOnce(&mut IntakeSession) -> (R, SessionFate),
    ) -> Option<R> {
        self.update_at(key, Instant::now(), edit)
    }

    pub fn update_at<R>(
        &self,
        key: ConversationKey,
        now: Instant,
        edit: impl FnOnce(&mut IntakeSession) -> (R, SessionFate),
    ) -> Option<R> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&key)?;
        if self.is_expired(entry, now) {
            entries.remove(&key);
            info!("event=intake_session module=intake status=expired");
            return None;
        }

        let mut session = entry.session.clone();
        let (result, fate) = edit(&mut session);
        match fate {
            SessionFate::Keep => {
                entry.session = session;
                entry.touched_at = now;
            }
            SessionFate::Untouched => {}
            SessionFate::Remove => {
                entries.remove(&key);
            }
        }
        Some(result)
    }

    /// Removes and returns the live session for `key`.
    pub fn take(&self, key: ConversationKey) -> Option<IntakeSession> {
        self.take_at(key, Instant::now())
    }

    pub fn take_at(&self, key: ConversationKey, now: Instant) -> Option<IntakeSession> {
        let entry = self.lock().remove(&key)?;
        (!self.is_expired(&entry, now)).then_some(entry.session)
    }

    /// Drops every session idle past the TTL. Returns how many were dropped.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.touched_at) <= self.idle_ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            info!("event=intake_session module=intake status=evicted count={evicted}");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.touched_at) > self.idle_ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationKey, Entry>> {
        // Map operations cannot leave the map half-updated, so a poisoned
        // lock is still safe to reuse.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
