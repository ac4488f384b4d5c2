//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Translate repository failures into the user-facing error taxonomy.
//!
//! # Invariants
//! - Missing or already-finalized targets are reported as `false`, not as
//!   errors.
//! - Transport/transaction failures surface as `StoreUnavailable`.

pub mod mood_service;
pub mod task_service;
pub mod user_service;

use crate::access::PrivilegedAction;
use crate::db::DbError;
use crate::model::task::TaskValidationError;
use crate::repo::RepoError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by use-case services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Persistence layer unreachable or the transaction failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] RepoError),
    #[error("permission denied for `{}`", .action.as_str())]
    PermissionDenied { action: PrivilegedAction },
    /// Bad user input; the caller should re-prompt.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::StoreUnavailable(other),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::StoreUnavailable(RepoError::Db(value))
    }
}

impl From<TaskValidationError> for ServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Maps a repository `NotFound` to `Ok(false)` and success to `Ok(true)`.
fn found(result: Result<(), RepoError>) -> ServiceResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(RepoError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
