//! Stateless free-text task intake.
//!
//! Turns one message such as `"Math: exercises 3-5 tomorrow"` into a subject,
//! a deadline and an AI step plan, then formats a confirmation. Nothing is
//! persisted here.

use crate::ai::EnrichmentGateway;
use chrono::{DateTime, Local, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const DEFAULT_SUBJECT: &str = "General";

static SUBJECT_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w\s]+):").expect("valid subject prefix regex"));

// Checked as whole phrases; a bare "tomorrow" falls through to +1 day.
const DAY_AFTER_TOMORROW: &[&str] = &["day after tomorrow", "послезавтра"];

/// Structured result of the free-text pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub subject: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub steps: String,
}

/// Splits an optional leading `label:` off `text`.
///
/// Returns `(subject, remaining description)`.
pub fn extract_subject(text: &str) -> (String, String) {
    let text = text.trim();
    if let Some(captures) = SUBJECT_PREFIX_RE.captures(text) {
        let label = captures[1].trim();
        if !label.is_empty() {
            let rest = text[captures[0].len()..].trim();
            return (label.to_string(), rest.to_string());
        }
    }
    (DEFAULT_SUBJECT.to_string(), text.to_string())
}

/// Recognizes "day after tomorrow" (+2 days) and "tomorrow" (+1 day);
/// anything else defaults to tomorrow.
pub fn infer_deadline(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let lowered = text.to_lowercase();
    let days = if DAY_AFTER_TOMORROW.iter().any(|p| lowered.contains(p)) {
        2
    } else {
        1
    };
    now + TimeDelta::days(days)
}

/// Human-readable summary of a parsed task.
pub fn format_confirmation(task: &ParsedTask) -> String {
    format!(
        "✅ Task accepted!\n\n📚 Subject: {}\n📅 Deadline: {}\n\n📝 Plan:\n{}\n\nGood luck! I will remind you about the deadline.",
        task.subject,
        task.deadline.with_timezone(&Local).format("%d.%m.%Y"),
        task.steps
    )
}

/// Free-text intake pipeline backed by the gateway for step decomposition.
pub struct TextIntake {
    gateway: Arc<EnrichmentGateway>,
}

impl TextIntake {
    pub fn new(gateway: Arc<EnrichmentGateway>) -> Self {
        Self { gateway }
    }

    /// Parses `raw` and asks for a step plan. Never fails: the plan falls
    /// back to a fixed list when the gateway is unavailable.
    pub async fn process(&self, raw: &str, now: DateTime<Utc>) -> ParsedTask {
        let (subject, description) = extract_subject(raw);
        let deadline = infer_deadline(&description, now);
        let steps = self.gateway.decompose_steps(&description).await;
        ParsedTask {
            subject,
            description,
            deadline,
            steps,
        }
    }

    /// Runs the pipeline and returns the confirmation with the parsed task.
    pub async fn handle(&self, raw: &str) -> (String, ParsedTask) {
        let task = self.process(raw, Utc::now()).await;
        (format_confirmation(&task), task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_prefix_is_split_off() {
        assert_eq!(
            extract_subject("Physics: lab report 4"),
            ("Physics".to_string(), "lab report 4".to_string())
        );
        assert_eq!(
            extract_subject("Русский язык: упражнение 12"),
            ("Русский язык".to_string(), "упражнение 12".to_string())
        );
    }

    #[test]
    fn missing_prefix_defaults_subject() {
        assert_eq!(
            extract_subject("read chapter 3, then summary: short"),
            (DEFAULT_SUBJECT.to_string(), "read chapter 3, then summary: short".to_string())
        );
    }

    #[test]
    fn day_after_tomorrow_is_not_read_as_tomorrow() {
        let now = Utc::now();
        assert_eq!(infer_deadline("due the day after tomorrow", now), now + TimeDelta::days(2));
        assert_eq!(infer_deadline("сдать послезавтра", now), now + TimeDelta::days(2));
        assert_eq!(infer_deadline("сдать завтра", now), now + TimeDelta::days(1));
        assert_eq!(infer_deadline("whenever", now), now + TimeDelta::days(1));
    }

    #[test]
    fn confirmation_mentions_all_parts() {
        let task = ParsedTask {
            subject: "Math".into(),
            description: "exercises".into(),
            deadline: Utc::now(),
            steps: "1. Start".into(),
        };
        let text = format_confirmation(&task);
        assert!(text.contains("Math"));
        assert!(text.contains("1. Start"));
    }
}
