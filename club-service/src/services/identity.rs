use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::models::{normalize_email, Account, IdentityClaims};
use crate::services::{error::ServiceError, store::AccountStore};
use crate::utils::{hash_password, needs_rehash, verify_password, Password};

/// Verified against when the email is unknown so that every failed login
/// costs one Argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    hash_password(&Password::new("club-service-timing-equalizer".to_string()))
        .map(|h| h.into_string())
        .ok()
});

/// Maps external identities and local credentials onto persisted accounts.
#[derive(Clone)]
pub struct IdentityResolver {
    accounts: Arc<dyn AccountStore>,
}

impl IdentityResolver {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Idempotent: repeated calls with the same identity converge on one account.
    #[tracing::instrument(skip_all, fields(subject = %identity.subject))]
    pub async fn resolve_or_create(
        &self,
        identity: &IdentityClaims,
    ) -> Result<Account, ServiceError> {
        let account = self
            .accounts
            .upsert_external_identity(identity, Utc::now())
            .await?;

        tracing::info!(user_id = %account.id, "External identity resolved");
        Ok(account)
    }

    pub async fn register_local(
        &self,
        name: String,
        email: &str,
        password: Password,
    ) -> Result<Account, ServiceError> {
        let email = normalize_email(email);

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
            .map_err(|e| anyhow::anyhow!("Password hashing error: {}", e))?;

        let account = Account::new_local(name, &email, password_hash.into_string());

        // The unique email index decides races between concurrent registrations.
        self.accounts.insert_account(&account).await?;

        tracing::info!(user_id = %account.id, "User registered");
        Ok(account)
    }

    /// Unknown email, OAuth-only account and wrong password fail identically.
    pub async fn authenticate_local(
        &self,
        email: &str,
        password: Password,
    ) -> Result<Account, ServiceError> {
        let account = self
            .accounts
            .find_account_by_email(&normalize_email(email))
            .await?;

        let stored_hash = account
            .as_ref()
            .and_then(|a| a.password_hash.clone())
            .or_else(|| DUMMY_HASH.clone());

        let verified = match stored_hash {
            Some(hash) => {
                let password = password.clone();
                tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                    .await
                    .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
            }
            None => false,
        };

        match account {
            Some(account) if verified && account.password_hash.is_some() => {
                Ok(self.upgrade_legacy_hash(account, password).await)
            }
            _ => {
                tracing::warn!("Failed password login attempt");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    /// Re-hash a bcrypt password with Argon2id after a successful login.
    /// Failures are logged; the login itself already succeeded.
    async fn upgrade_legacy_hash(&self, mut account: Account, password: Password) -> Account {
        let Some(current) = account.password_hash.clone() else {
            return account;
        };
        if !needs_rehash(&current) {
            return account;
        }

        let rehashed = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
            Ok(Ok(hash)) => hash.into_string(),
            Ok(Err(e)) => {
                tracing::warn!(user_id = %account.id, error = %e, "Password rehash failed");
                return account;
            }
            Err(e) => {
                tracing::warn!(user_id = %account.id, error = %e, "Password rehash task failed");
                return account;
            }
        };

        match self
            .accounts
            .replace_password_hash(&account.id, &current, &rehashed, Utc::now())
            .await
        {
            Ok(true) => {
                tracing::info!(user_id = %account.id, "Legacy password hash upgraded");
                account.password_hash = Some(rehashed);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user_id = %account.id, error = %e, "Storing upgraded hash failed")
            }
        }
        account
    }
}
