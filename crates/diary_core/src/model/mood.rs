//! Mood log domain model.
//!
//! Append-only audit trail of how a student feels and how loaded they are.

use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accepted range for the self-reported load level.
pub const LOAD_LEVEL_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Coarse mood category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Neutral,
    Stressed,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Stressed => "stressed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "happy" => Some(Self::Happy),
            "neutral" => Some(Self::Neutral),
            "stressed" => Some(Self::Stressed),
            _ => None,
        }
    }
}

/// One persisted mood entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodLog {
    pub id: i64,
    pub user_id: UserId,
    pub mood: Mood,
    pub load_level: u8,
    pub created_at: DateTime<Utc>,
}
