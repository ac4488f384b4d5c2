//! Administrator privilege gate.
//!
//! # Responsibility
//! - Name every privileged action with a stable string id.
//! - Decide whether an external participant may perform one.
//!
//! # Invariants
//! - Exactly one administrator identity is trusted; matching is exact.
//! - With no administrator configured, every privileged action is denied.

use crate::model::user::ExternalId;
use crate::service::ServiceError;
use log::warn;

/// Mutations that only the administrator may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegedAction {
    /// Entering the guided task intake (or the quick-add shortcut).
    CreateTask,
    DeleteTask,
    EditTask,
}

impl PrivilegedAction {
    /// Stable id used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::DeleteTask => "delete_task",
            Self::EditTask => "edit_task",
        }
    }
}

/// Administrator policy loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdminPolicy {
    admin: Option<ExternalId>,
}

impl AdminPolicy {
    pub fn new(admin: Option<ExternalId>) -> Self {
        Self { admin }
    }

    pub fn is_admin(&self, actor: ExternalId) -> bool {
        self.admin == Some(actor)
    }

    /// Returns `PermissionDenied` unless `actor` is the administrator.
    pub fn require(&self, actor: ExternalId, action: PrivilegedAction) -> Result<(), ServiceError> {
        if self.is_admin(actor) {
            return Ok(());
        }
        warn!(
            "event=privilege_check module=access status=denied action={}",
            action.as_str()
        );
        Err(ServiceError::PermissionDenied { action })
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminPolicy, PrivilegedAction};
    use crate::service::ServiceError;

    #[test]
    fn only_exact_admin_passes() {
        let policy = AdminPolicy::new(Some(42));
        assert!(policy.require(42, PrivilegedAction::DeleteTask).is_ok());
        let err = policy
            .require(43, PrivilegedAction::EditTask)
            .expect_err("non-admin must be rejected");
        assert!(matches!(
            err,
            ServiceError::PermissionDenied {
                action: PrivilegedAction::EditTask
            }
        ));
    }

    #[test]
    fn unconfigured_admin_denies_everyone() {
        let policy = AdminPolicy::default();
        assert!(!policy.is_admin(0));
        assert!(policy.require(1, PrivilegedAction::CreateTask).is_err());
    }

    #[test]
    fn action_ids_are_stable() {
        assert_eq!(PrivilegedAction::CreateTask.as_str(), "create_task");
        assert_eq!(PrivilegedAction::DeleteTask.as_str(), "delete_task");
        assert_eq!(PrivilegedAction::EditTask.as_str(), "edit_task");
    }
}
