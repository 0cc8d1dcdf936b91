use chrono::Utc;
use std::sync::Arc;

use crate::models::{Account, Role};
use crate::services::{
    access::{decide, Action, Actor, Resource},
    error::ServiceError,
    store::AccountStore,
};

/// Admin operations on accounts.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn list(&self, actor: &Account) -> Result<Vec<Account>, ServiceError> {
        decide(Actor::from(actor), Action::ListAccounts, Resource::None).into_result()?;
        self.accounts.list_accounts().await
    }

    pub async fn change_role(
        &self,
        actor: &Account,
        target_id: &str,
        role: &str,
    ) -> Result<Account, ServiceError> {
        decide(Actor::from(actor), Action::ManageRoles, Resource::None).into_result()?;

        let role: Role = role
            .parse()
            .map_err(|_| ServiceError::Validation("Invalid role".to_string()))?;

        let target = self
            .accounts
            .find_account(target_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        decide(
            Actor::from(actor),
            Action::ChangeRole,
            Resource::Account {
                current_role: target.role,
            },
        )
        .into_result()?;

        // The read above can be stale; the write itself refuses admin targets.
        let updated = match self
            .accounts
            .set_role_unless_admin(target_id, role, Utc::now())
            .await?
        {
            Some(updated) => updated,
            None => {
                return match self.accounts.find_account(target_id).await? {
                    Some(_) => Err(ServiceError::AdminLocked),
                    None => Err(ServiceError::NotFound("User")),
                }
            }
        };

        tracing::info!(
            target_id = %target_id,
            actor_id = %actor.id,
            role = %role,
            "Role changed"
        );
        Ok(updated)
    }
}
