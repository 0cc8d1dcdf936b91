//! MongoDB implementation of the persistence traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
    },
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::time::Duration;
use uuid::Uuid;

use crate::config::MongoConfig;
use crate::models::{
    timestamp, Account, Attachment, Event, EventPatch, EventStatus, IdentityClaims, Role,
    StatusChange,
};
use crate::services::error::ServiceError;
use crate::services::store::{AccountStore, AttachmentStore, EventStore};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    /// Connects to the primary URI, falling back to the alternate one if the
    /// primary cannot be reached within the server-selection timeout.
    pub async fn connect(config: &MongoConfig) -> Result<Self, anyhow::Error> {
        let timeout = Duration::from_secs(config.server_selection_timeout_secs);

        match Self::try_connect(&config.uri, &config.database, timeout).await {
            Ok(db) => Ok(db),
            Err(primary_err) => {
                let Some(fallback) = &config.fallback_uri else {
                    return Err(primary_err);
                };
                tracing::warn!(
                    error = %primary_err,
                    "Primary MongoDB endpoint unreachable, trying fallback"
                );
                Self::try_connect(fallback, &config.database, timeout)
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!(
                            "MongoDB unreachable (primary: {}; fallback: {})",
                            primary_err,
                            e
                        )
                    })
            }
        }
    }

    async fn try_connect(
        uri: &str,
        database: &str,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);
        options.app_name = Some("club-service".to_string());

        let client = MongoClient::with_options(options)?;
        let db = Self {
            db: client.database(database),
            client,
        };
        // The driver connects lazily; ping to find out now.
        db.ping().await?;
        tracing::info!(database = %database, "Connected to MongoDB");
        Ok(db)
    }

    async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
    }

    pub async fn initialize_indexes(&self) -> Result<(), anyhow::Error> {
        tracing::info!("Creating MongoDB indexes");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.accounts().create_index(email_index, None).await?;

        let subject_index = IndexModel::builder()
            .keys(doc! { "google_sub": 1 })
            .options(
                IndexOptions::builder()
                    .name("google_sub_lookup".to_string())
                    .sparse(true)
                    .build(),
            )
            .build();
        self.accounts().create_index(subject_index, None).await?;

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "start_time": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_start_lookup".to_string())
                    .build(),
            )
            .build();
        self.events().create_index(status_index, None).await?;

        let event_files_index = IndexModel::builder()
            .keys(doc! { "event_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("event_files_lookup".to_string())
                    .build(),
            )
            .build();
        self.attachments().create_index(event_files_index, None).await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    pub fn accounts(&self) -> Collection<Account> {
        self.db.collection("users")
    }

    pub fn events(&self) -> Collection<Event> {
        self.db.collection("events")
    }

    pub fn attachments(&self) -> Collection<Attachment> {
        self.db.collection("files")
    }

    fn return_after(upsert: bool) -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build()
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn identity_upsert(identity: &IdentityClaims, now: &DateTime<Utc>) -> (Document, Document) {
    let filter = doc! {
        "$or": [
            { "google_sub": identity.subject.as_str() },
            { "email": identity.email.as_str() },
        ]
    };

    let mut set = doc! {
        "name": identity.name.as_str(),
        "google_sub": identity.subject.as_str(),
        "updated_at": timestamp::to_bson(now),
    };
    if let Some(picture) = &identity.picture {
        set.insert("picture", picture.as_str());
    }

    let update = doc! {
        "$set": set,
        "$setOnInsert": {
            "_id": Uuid::new_v4().to_string(),
            "email": identity.email.as_str(),
            "role": Role::User.as_str(),
            "created_at": timestamp::to_bson(now),
        },
    };

    (filter, update)
}

// ==================== Accounts ====================

#[async_trait]
impl AccountStore for MongoDb {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.ping().await.map_err(|e| {
            tracing::error!("MongoDB health check failed: {}", e);
            ServiceError::Database(e)
        })
    }

    async fn find_account(&self, id: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self.accounts().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self.accounts().find_one(doc! { "email": email }, None).await?)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError> {
        match self.accounts().insert_one(account, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(ServiceError::EmailAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_external_identity(
        &self,
        identity: &IdentityClaims,
        now: DateTime<Utc>,
    ) -> Result<Account, ServiceError> {
        // Two first-time logins racing on the same email: the loser hits the
        // unique index and its retry matches the winner's document.
        for attempt in 0..2 {
            let (filter, update) = identity_upsert(identity, &now);
            match self
                .accounts()
                .find_one_and_update(filter, update, Self::return_after(true))
                .await
            {
                Ok(Some(account)) => return Ok(account),
                Ok(None) => {
                    return Err(ServiceError::Internal(anyhow::anyhow!(
                        "Upsert returned no document"
                    )))
                }
                Err(e) if is_duplicate_key(&e) && attempt == 0 => {
                    tracing::debug!("Concurrent account creation detected, retrying upsert");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Internal(anyhow::anyhow!(
            "Account upsert did not converge"
        )))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self.accounts().find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_role_unless_admin(
        &self,
        id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, ServiceError> {
        let filter = doc! { "_id": id, "role": { "$ne": Role::Admin.as_str() } };
        let update = doc! {
            "$set": { "role": role.as_str(), "updated_at": timestamp::to_bson(&now) }
        };

        Ok(self
            .accounts()
            .find_one_and_update(filter, update, Self::return_after(false))
            .await?)
    }

    async fn replace_password_hash(
        &self,
        id: &str,
        expected: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = self
            .accounts()
            .update_one(
                doc! { "_id": id, "password": expected },
                doc! {
                    "$set": { "password": password_hash, "updated_at": timestamp::to_bson(&now) }
                },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn delete_account(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self.accounts().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

// ==================== Events ====================

#[async_trait]
impl EventStore for MongoDb {
    async fn insert_event(&self, event: &Event) -> Result<(), ServiceError> {
        self.events().insert_one(event, None).await?;
        Ok(())
    }

    async fn find_event(&self, id: &str) -> Result<Option<Event>, ServiceError> {
        Ok(self.events().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, ServiceError> {
        let filter = status.map(|s| doc! { "status": s.as_str() });
        let options = FindOptions::builder().sort(doc! { "start_time": 1 }).build();
        let cursor = self.events().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_event_fields(
        &self,
        id: &str,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError> {
        let mut set = doc! { "updated_at": timestamp::to_bson(&now) };
        if let Some(title) = &patch.title {
            set.insert("title", title.as_str());
        }
        if let Some(description) = &patch.description {
            set.insert("description", description.as_str());
        }
        if let Some(start_time) = &patch.start_time {
            set.insert("start_time", timestamp::to_bson(start_time));
        }
        if let Some(end_time) = &patch.end_time {
            set.insert("end_time", timestamp::to_bson(end_time));
        }

        Ok(self
            .events()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": set },
                Self::return_after(false),
            )
            .await?)
    }

    async fn apply_status_change(
        &self,
        id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, ServiceError> {
        let set = match change {
            StatusChange::Approve { approved_by } => doc! {
                "status": EventStatus::Approved.as_str(),
                "approved_by": approved_by.as_str(),
                "updated_at": timestamp::to_bson(&now),
            },
            StatusChange::Archive => doc! {
                "status": EventStatus::Archived.as_str(),
                "archived_at": timestamp::to_bson(&now),
                "updated_at": timestamp::to_bson(&now),
            },
        };

        Ok(self
            .events()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": set },
                Self::return_after(false),
            )
            .await?)
    }

    async fn delete_event(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self.events().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

// ==================== Attachments ====================

#[async_trait]
impl AttachmentStore for MongoDb {
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), ServiceError> {
        self.attachments().insert_one(attachment, None).await?;
        Ok(())
    }

    async fn find_attachment(&self, id: &str) -> Result<Option<Attachment>, ServiceError> {
        Ok(self.attachments().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_attachments(&self, event_id: &str) -> Result<Vec<Attachment>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "uploaded_at": 1 }).build();
        let cursor = self
            .attachments()
            .find(doc! { "event_id": event_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_attachment(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self.attachments().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}
