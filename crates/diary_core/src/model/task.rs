//! Task domain model.
//!
//! # Responsibility
//! - Define the homework task record and its difficulty scale.
//! - Provide input validation shared by every write path.
//!
//! # Invariants
//! - `difficulty` is always one of `easy|normal|hard`; anything else coming
//!   from an AI response or a legacy row is coerced to `Normal`.
//! - `is_completed` only ever moves from `false` to `true`.

use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned task identifier.
pub type TaskId = i64;

const MAX_SUBJECT_CHARS: usize = 120;

/// Three-valued difficulty driving the experience reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// Stable storage/prompt token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Strict parse of a storage token.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// Lenient parse of a free-text classification answer.
    ///
    /// Accepts surrounding whitespace, case differences and trailing
    /// punctuation (`"Hard."`); anything else maps to `Normal`.
    pub fn from_classification(answer: &str) -> Self {
        let token = answer
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        Self::parse(&token).unwrap_or_default()
    }

    /// Marker used in task listings.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Easy => "🟢",
            Self::Normal => "🟡",
            Self::Hard => "🔴",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted homework task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub subject: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub is_completed: bool,
    pub difficulty: Difficulty,
    /// Opaque AI-produced plan, stored verbatim.
    pub steps: Option<String>,
    /// Owner's cohort label at creation time.
    pub class_name: Option<String>,
}

/// Insert model for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: UserId,
    pub subject: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub difficulty: Difficulty,
    pub steps: Option<String>,
    pub class_name: Option<String>,
}

impl NewTask {
    /// Validates user-provided fields before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_subject(&self.subject)
    }
}

/// Checks a subject value for create and edit paths.
pub fn validate_subject(subject: &str) -> Result<(), TaskValidationError> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptySubject);
    }
    if trimmed.chars().count() > MAX_SUBJECT_CHARS {
        return Err(TaskValidationError::SubjectTooLong {
            max_chars: MAX_SUBJECT_CHARS,
        });
    }
    Ok(())
}

/// Field-level validation failures for task input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    #[error("task subject must not be empty")]
    EmptySubject,
    #[error("task subject must be at most {max_chars} characters")]
    SubjectTooLong { max_chars: usize },
}
