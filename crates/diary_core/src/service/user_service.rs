//! User resolution and profile use-cases.
//!
//! # Responsibility
//! - Resolve a chat participant to exactly one durable `User`.
//! - Apply class choice and reminder bookkeeping.
//!
//! # Invariants
//! - `resolve_or_create` is idempotent: for one external id every caller,
//!   concurrent or not, observes the same row.
//! - A failed insert is retried as a lookup exactly once.

use super::{ServiceError, ServiceResult};
use crate::model::user::{is_known_class, ExternalId, NewUser, User, UserId};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use log::{info, warn};

/// Use-case service for user identity and profile.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Looks up the participant, creating the record on first contact.
    ///
    /// # Contract
    /// - New users start with `xp=0, level=1` and no class.
    /// - When the insert fails (for example because a concurrent resolver
    ///   committed the same external id first) the lookup is retried once.
    ///
    /// # Errors
    /// - `StoreUnavailable` when the first lookup fails, or when the retried
    ///   lookup fails or still finds nothing.
    pub fn resolve_or_create(
        &self,
        external_id: ExternalId,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> ServiceResult<User> {
        if let Some(user) = self.repo.find_by_external_id(external_id)? {
            return Ok(user);
        }

        let new_user = NewUser {
            external_id,
            username: username.map(str::to_owned),
            full_name: full_name.map(str::to_owned),
        };
        let insert_err = match self.repo.insert_user(&new_user) {
            Ok(user) => {
                info!("event=user_resolve module=service status=created user_id={}", user.id);
                return Ok(user);
            }
            Err(err) => err,
        };

        warn!(
            "event=user_resolve module=service status=retry conflict={} error={}",
            insert_err.is_constraint_violation(),
            insert_err
        );
        match self.repo.find_by_external_id(external_id) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::StoreUnavailable(insert_err)),
            Err(err) => Err(ServiceError::StoreUnavailable(err)),
        }
    }

    pub fn get(&self, external_id: ExternalId) -> ServiceResult<Option<User>> {
        Ok(self.repo.find_by_external_id(external_id)?)
    }

    pub fn get_by_id(&self, id: UserId) -> ServiceResult<Option<User>> {
        Ok(self.repo.get_user(id)?)
    }

    /// Stores the participant's class choice.
    ///
    /// Returns `Ok(None)` when the participant was never resolved.
    pub fn set_class(&self, external_id: ExternalId, class_name: &str) -> ServiceResult<Option<User>> {
        let class_name = class_name.trim();
        if !is_known_class(class_name) {
            return Err(ServiceError::Validation(format!(
                "unknown class `{class_name}`"
            )));
        }
        match self.repo.set_class(external_id, class_name) {
            Ok(user) => Ok(Some(user)),
            Err(RepoError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Records that a reminder was sent at `at`. Returns `false` for
    /// unknown participants.
    pub fn mark_reminded(&self, external_id: ExternalId, at: DateTime<Utc>) -> ServiceResult<bool> {
        super::found(self.repo.mark_reminded(external_id, at))
    }
}
