//! Persistence seams. `MongoDb` is the production implementation,
//! `InMemoryStore` backs tests and local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    Account, Attachment, Event, EventPatch, EventStatus, IdentityClaims, Role, StatusChange,
};
use crate::services::error::ServiceError;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_account(&self, id: &str) -> Result<Option<Account>, ServiceError>;

    /// `email` must already be normalized.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError>;

    /// Fails with `EmailAlreadyExists` when the email is taken.
    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError>;

    /// Atomically update the account matching the subject or email, or create
    /// one with role `user` and no password.
    async fn upsert_external_identity(
        &self,
        identity: &IdentityClaims,
        now: DateTime<Utc>,
    ) -> Result<Account, ServiceError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, ServiceError>;

    /// Conditional write: only applies while the target is not an admin.
    /// Returns `None` when nothing matched.
    async fn set_role_unless_admin(
        &self,
        id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, ServiceError>;

    /// Replace the stored hash only while it still equals `expected`.
    async fn replace_password_hash(
        &self,
        id: &str,
        expected: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn delete_account(&self, id: &str) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &Event) -> Result<(), ServiceError>;

    async fn find_event(&self, id: &str) -> Result<Option<Event>, ServiceError>;

    /// Ordered by start time.
    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, ServiceError>;

    async fn update_event_fields(
        &self,
        id: &str,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError>;

    async fn apply_status_change(
        &self,
        id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError>;

    async fn delete_event(&self, id: &str) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), ServiceError>;

    async fn find_attachment(&self, id: &str) -> Result<Option<Attachment>, ServiceError>;

    /// Ordered by upload time.
    async fn list_attachments(&self, event_id: &str) -> Result<Vec<Attachment>, ServiceError>;

    async fn delete_attachment(&self, id: &str) -> Result<bool, ServiceError>;
}

/// Mutex-guarded maps; each operation holds the lock for its whole
/// read-modify-write, which gives the same atomicity as the database writes.
#[derive(Default)]
pub struct InMemoryStore {
    accounts: Mutex<HashMap<String, Account>>,
    events: Mutex<HashMap<String, Event>>,
    attachments: Mutex<HashMap<String, Attachment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn guard<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, ServiceError> {
    mutex.lock().map_err(|e| {
        ServiceError::Internal(anyhow::anyhow!(
            "In-memory {} mutex poisoned: {}",
            name,
            e
        ))
    })
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn find_account(&self, id: &str) -> Result<Option<Account>, ServiceError> {
        Ok(guard(&self.accounts, "accounts")?.get(id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        Ok(guard(&self.accounts, "accounts")?
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError> {
        let mut accounts = guard(&self.accounts, "accounts")?;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(ServiceError::EmailAlreadyExists);
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn upsert_external_identity(
        &self,
        identity: &IdentityClaims,
        now: DateTime<Utc>,
    ) -> Result<Account, ServiceError> {
        let mut accounts = guard(&self.accounts, "accounts")?;

        let existing = accounts.values_mut().find(|a| {
            a.google_sub.as_deref() == Some(identity.subject.as_str()) || a.email == identity.email
        });

        if let Some(account) = existing {
            account.name = identity.name.clone();
            if identity.picture.is_some() {
                account.picture = identity.picture.clone();
            }
            account.google_sub = Some(identity.subject.clone());
            account.updated_at = now;
            return Ok(account.clone());
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: Role::User,
            google_sub: Some(identity.subject.clone()),
            password_hash: None,
            picture: identity.picture.clone(),
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, ServiceError> {
        let mut accounts: Vec<Account> = guard(&self.accounts, "accounts")?
            .values()
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    async fn set_role_unless_admin(
        &self,
        id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, ServiceError> {
        let mut accounts = guard(&self.accounts, "accounts")?;
        match accounts.get_mut(id) {
            Some(account) if account.role != Role::Admin => {
                account.role = role;
                account.updated_at = now;
                Ok(Some(account.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn replace_password_hash(
        &self,
        id: &str,
        expected: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut accounts = guard(&self.accounts, "accounts")?;
        match accounts.get_mut(id) {
            Some(account) if account.password_hash.as_deref() == Some(expected) => {
                account.password_hash = Some(password_hash.to_string());
                account.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_account(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(guard(&self.accounts, "accounts")?.remove(id).is_some())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<(), ServiceError> {
        guard(&self.events, "events")?.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn find_event(&self, id: &str) -> Result<Option<Event>, ServiceError> {
        Ok(guard(&self.events, "events")?.get(id).cloned())
    }

    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, ServiceError> {
        let mut events: Vec<Event> = guard(&self.events, "events")?
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(events)
    }

    async fn update_event_fields(
        &self,
        id: &str,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError> {
        let mut events = guard(&self.events, "events")?;
        let Some(event) = events.get_mut(id) else {
            return Ok(None);
        };

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(start_time) = patch.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            event.end_time = end_time;
        }
        event.updated_at = now;
        Ok(Some(event.clone()))
    }

    async fn apply_status_change(
        &self,
        id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError> {
        let mut events = guard(&self.events, "events")?;
        let Some(event) = events.get_mut(id) else {
            return Ok(None);
        };

        match change {
            StatusChange::Approve { approved_by } => {
                event.status = EventStatus::Approved;
                event.approved_by = Some(approved_by.clone());
            }
            StatusChange::Archive => {
                event.status = EventStatus::Archived;
                event.archived_at = Some(now);
            }
        }
        event.updated_at = now;
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(guard(&self.events, "events")?.remove(id).is_some())
    }
}

#[async_trait]
impl AttachmentStore for InMemoryStore {
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), ServiceError> {
        guard(&self.attachments, "attachments")?.insert(attachment.id.clone(), attachment.clone());
        Ok(())
    }

    async fn find_attachment(&self, id: &str) -> Result<Option<Attachment>, ServiceError> {
        Ok(guard(&self.attachments, "attachments")?.get(id).cloned())
    }

    async fn list_attachments(&self, event_id: &str) -> Result<Vec<Attachment>, ServiceError> {
        let mut attachments: Vec<Attachment> = guard(&self.attachments, "attachments")?
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(attachments)
    }

    async fn delete_attachment(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(guard(&self.attachments, "attachments")?.remove(id).is_some())
    }
}
