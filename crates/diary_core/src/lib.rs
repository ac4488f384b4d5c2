//! Core domain logic for the study diary assistant.
//! This crate is the single source of truth for task, user and progression
//! invariants; transports only translate events in and replies out.

pub mod access;
pub mod ai;
pub mod assistant;
pub mod config;
pub mod db;
pub mod intake;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{AdminPolicy, PrivilegedAction};
pub use ai::{EnrichmentFailure, EnrichmentGateway, GatewayConfig, SearchConfig};
pub use assistant::{Assistant, AssistantInitError, Choice, EventKind, InboundEvent, Reply};
pub use config::{AppConfig, ConfigError};
pub use db::{DbError, Store};
pub use intake::{GuidedIntake, IntakeOutcome, IntakeStep, TextIntake};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::mood::{Mood, MoodLog};
pub use model::progression::{level_for, ProgressSummary};
pub use model::task::{Difficulty, NewTask, Task, TaskId};
pub use model::user::{ExternalId, User, UserId};
pub use repo::{RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
