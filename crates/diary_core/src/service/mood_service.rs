//! Mood log use-cases.

use super::{ServiceError, ServiceResult};
use crate::model::mood::{Mood, MoodLog, LOAD_LEVEL_RANGE};
use crate::model::user::UserId;
use crate::repo::mood_repo::MoodRepository;
use chrono::Utc;

/// Default number of entries shown by the mood history.
pub const RECENT_MOODS_LIMIT: u32 = 5;

pub struct MoodService<R: MoodRepository> {
    repo: R,
}

impl<R: MoodRepository> MoodService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends one entry stamped with the current time.
    pub fn add_mood(&self, user_id: UserId, mood: Mood, load_level: u8) -> ServiceResult<MoodLog> {
        if !LOAD_LEVEL_RANGE.contains(&load_level) {
            return Err(ServiceError::Validation(format!(
                "load level must be between {} and {}",
                LOAD_LEVEL_RANGE.start(),
                LOAD_LEVEL_RANGE.end()
            )));
        }
        Ok(self.repo.append_mood(user_id, mood, load_level, Utc::now())?)
    }

    pub fn recent_moods(&self, user_id: UserId, limit: u32) -> ServiceResult<Vec<MoodLog>> {
        Ok(self.repo.recent_moods(user_id, limit)?)
    }
}
