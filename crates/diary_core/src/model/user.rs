//! User domain model.
//!
//! # Responsibility
//! - Describe one chat participant and their gamification counters.
//!
//! # Invariants
//! - `external_id` is stable and unique across all users.
//! - `xp` never decreases; `level == progression::level_for(xp)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned row identifier.
pub type UserId = i64;

/// Stable identifier of a chat participant in the transport system.
pub type ExternalId = i64;

/// Class/cohort labels offered by the class picker.
pub const CLASS_NAMES: &[&str] = &[
    "6А", "6В", "7А", "7В", "7С", "8А", "8Б", "9А", "10А", "11А",
];

/// Returns whether `class_name` is one of the offered cohort labels.
pub fn is_known_class(class_name: &str) -> bool {
    CLASS_NAMES.contains(&class_name)
}

/// Durable user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalId,
    /// Transport handle, e.g. `@name`.
    pub username: Option<String>,
    pub full_name: Option<String>,
    /// `None` until the participant picks a class.
    pub class_name: Option<String>,
    pub xp: u32,
    pub level: u32,
    pub last_reminded_at: Option<DateTime<Utc>>,
}

impl User {
    /// Best human-readable name for greetings.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("student")
    }
}

/// Insert model for first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: ExternalId,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_are_exact_matches() {
        assert!(is_known_class("7А"));
        assert!(is_known_class("11А"));
        assert!(!is_known_class("7a"));
        assert!(!is_known_class(""));
    }

    #[test]
    fn display_name_prefers_full_name() {
        let mut user = User {
            id: 1,
            external_id: 10,
            username: Some("anna_k".into()),
            full_name: Some("Anna K".into()),
            class_name: None,
            xp: 0,
            level: 1,
            last_reminded_at: None,
        };
        assert_eq!(user.display_name(), "Anna K");
        user.full_name = None;
        assert_eq!(user.display_name(), "anna_k");
        user.username = None;
        assert_eq!(user.display_name(), "student");
    }
}
