//! Role-based access decisions for event lifecycle and account administration.
//!
//! Everything here is pure: callers load whatever resource state a rule needs
//! and pass it in.

use crate::models::{Account, Role};
use crate::services::error::ServiceError;

/// Who is asking.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub id: &'a str,
    pub role: Role,
}

impl<'a> From<&'a Account> for Actor<'a> {
    fn from(account: &'a Account) -> Self {
        Actor {
            id: &account.id,
            role: account.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateEvent,
    UpdateEvent,
    ApproveEvent,
    ArchiveEvent,
    DeleteEvent,
    /// Gate for the role endpoint before any target is loaded.
    ManageRoles,
    ChangeRole,
    ListAccounts,
}

/// State of the target the action applies to, as far as the rules care.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    None,
    Event { organizer_id: &'a str },
    Account { current_role: Role },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InsufficientRole,
    NotOrganizer,
    AdminLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), ServiceError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::InsufficientRole) => {
                Err(ServiceError::Forbidden("Insufficient permissions".to_string()))
            }
            Decision::Deny(DenyReason::NotOrganizer) => Err(ServiceError::Forbidden(
                "Only the organizer or an admin can modify this event".to_string(),
            )),
            Decision::Deny(DenyReason::AdminLocked) => Err(ServiceError::AdminLocked),
        }
    }
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// Combinations not covered by a rule are denied.
pub fn decide(actor: Actor<'_>, action: Action, resource: Resource<'_>) -> Decision {
    use Decision::{Allow, Deny};

    match (action, actor.role) {
        (Action::CreateEvent, Role::CoreMember | Role::Admin) => Allow,
        (Action::ArchiveEvent, Role::CoreMember | Role::Admin) => Allow,
        (
            Action::ApproveEvent | Action::DeleteEvent | Action::ListAccounts | Action::ManageRoles,
            Role::Admin,
        ) => Allow,

        (Action::UpdateEvent, Role::Admin) => Allow,
        (Action::UpdateEvent, _) => match resource {
            Resource::Event { organizer_id } if organizer_id == actor.id => Allow,
            Resource::Event { .. } => Deny(DenyReason::NotOrganizer),
            _ => Deny(DenyReason::InsufficientRole),
        },

        (Action::ChangeRole, Role::Admin) => match resource {
            Resource::Account {
                current_role: Role::Admin,
            } => Deny(DenyReason::AdminLocked),
            Resource::Account { .. } => Allow,
            _ => Deny(DenyReason::InsufficientRole),
        },

        _ => Deny(DenyReason::InsufficientRole),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 3] = [Role::User, Role::CoreMember, Role::Admin];

    fn actor(role: Role) -> Actor<'static> {
        Actor { id: "actor-1", role }
    }

    fn allowed(role: Role, action: Action, resource: Resource<'_>) -> bool {
        decide(actor(role), action, resource).is_allowed()
    }

    #[test]
    fn create_event_needs_core_member_or_admin() {
        assert_eq!(
            decide(actor(Role::User), Action::CreateEvent, Resource::None),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert!(allowed(Role::CoreMember, Action::CreateEvent, Resource::None));
        assert!(allowed(Role::Admin, Action::CreateEvent, Resource::None));
    }

    #[test]
    fn approve_and_delete_are_admin_only() {
        for action in [
            Action::ApproveEvent,
            Action::DeleteEvent,
            Action::ListAccounts,
            Action::ManageRoles,
        ] {
            assert!(!allowed(Role::User, action, Resource::None));
            assert!(!allowed(Role::CoreMember, action, Resource::None));
            assert!(allowed(Role::Admin, action, Resource::None));
        }
    }

    #[test]
    fn archive_needs_core_member_or_admin() {
        assert!(!allowed(Role::User, Action::ArchiveEvent, Resource::None));
        assert!(allowed(Role::CoreMember, Action::ArchiveEvent, Resource::None));
        assert!(allowed(Role::Admin, Action::ArchiveEvent, Resource::None));
    }

    #[test]
    fn organizer_may_update_own_event_whatever_the_role() {
        for role in ALL_ROLES {
            let own = Resource::Event {
                organizer_id: "actor-1",
            };
            assert!(allowed(role, Action::UpdateEvent, own));
        }
    }

    #[test]
    fn non_organizer_update_is_denied_unless_admin() {
        let foreign = Resource::Event {
            organizer_id: "someone-else",
        };
        assert_eq!(
            decide(actor(Role::User), Action::UpdateEvent, foreign),
            Decision::Deny(DenyReason::NotOrganizer)
        );
        assert_eq!(
            decide(actor(Role::CoreMember), Action::UpdateEvent, foreign),
            Decision::Deny(DenyReason::NotOrganizer)
        );
        assert!(allowed(Role::Admin, Action::UpdateEvent, foreign));
    }

    #[test]
    fn update_without_event_is_denied_for_non_admin() {
        assert!(!allowed(Role::CoreMember, Action::UpdateEvent, Resource::None));
    }

    #[test]
    fn admin_lock_blocks_role_changes_on_admins() {
        let target_admin = Resource::Account {
            current_role: Role::Admin,
        };
        assert_eq!(
            decide(actor(Role::Admin), Action::ChangeRole, target_admin),
            Decision::Deny(DenyReason::AdminLocked)
        );
        assert!(allowed(
            Role::Admin,
            Action::ChangeRole,
            Resource::Account {
                current_role: Role::CoreMember
            }
        ));
    }

    #[test]
    fn only_admins_change_roles() {
        let target = Resource::Account {
            current_role: Role::User,
        };
        assert_eq!(
            decide(actor(Role::CoreMember), Action::ChangeRole, target),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert!(!allowed(Role::User, Action::ChangeRole, target));
    }

    #[test]
    fn role_change_without_target_state_is_denied() {
        assert!(!allowed(Role::Admin, Action::ChangeRole, Resource::None));
    }

    #[test]
    fn deny_reasons_map_to_errors() {
        assert!(matches!(
            Decision::Deny(DenyReason::AdminLocked).into_result(),
            Err(ServiceError::AdminLocked)
        ));
        assert!(matches!(
            Decision::Deny(DenyReason::NotOrganizer).into_result(),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(Decision::Allow.into_result().is_ok());
    }
}
