use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{Account, Event, EventPatch, EventStatus, StatusChange};
use crate::services::{
    access::{decide, Action, Actor, Resource},
    error::ServiceError,
    storage::ObjectStorage,
    store::{AttachmentStore, EventStore},
};

pub const MAX_TITLE_CHARS: usize = 200;

/// Fields supplied when creating an event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventStore>,
    attachments: Arc<dyn AttachmentStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventStore>,
        attachments: Arc<dyn AttachmentStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            events,
            attachments,
            storage,
        }
    }

    pub async fn create(&self, actor: &Account, draft: EventDraft) -> Result<Event, ServiceError> {
        decide(Actor::from(actor), Action::CreateEvent, Resource::None).into_result()?;

        let title = validate_title(&draft.title)?;
        validate_schedule(draft.start_time, draft.end_time)?;

        let event = Event::new(
            actor.id.clone(),
            title,
            draft.description,
            draft.start_time,
            draft.end_time,
        );
        self.events.insert_event(&event).await?;

        tracing::info!(event_id = %event.id, organizer_id = %actor.id, "Event created");
        Ok(event)
    }

    pub async fn list(&self, status: Option<EventStatus>) -> Result<Vec<Event>, ServiceError> {
        self.events.list_events(status).await
    }

    pub async fn get(&self, id: &str) -> Result<Event, ServiceError> {
        self.events
            .find_event(id)
            .await?
            .ok_or(ServiceError::NotFound("Event"))
    }

    /// Ownership needs the stored event, so a missing event is reported before
    /// any permission problem.
    pub async fn update(
        &self,
        actor: &Account,
        id: &str,
        mut patch: EventPatch,
    ) -> Result<Event, ServiceError> {
        let current = self.get(id).await?;
        decide(
            Actor::from(actor),
            Action::UpdateEvent,
            Resource::Event {
                organizer_id: &current.organizer_id,
            },
        )
        .into_result()?;

        if let Some(title) = patch.title.take() {
            patch.title = Some(validate_title(&title)?);
        }
        validate_schedule(
            patch.start_time.unwrap_or(current.start_time),
            patch.end_time.unwrap_or(current.end_time),
        )?;

        if patch.is_empty() {
            return Ok(current);
        }

        let updated = self
            .events
            .update_event_fields(id, &patch, Utc::now())
            .await?
            .ok_or(ServiceError::NotFound("Event"))?;

        tracing::info!(event_id = %id, user_id = %actor.id, "Event updated");
        Ok(updated)
    }

    pub async fn approve(&self, actor: &Account, id: &str) -> Result<Event, ServiceError> {
        decide(Actor::from(actor), Action::ApproveEvent, Resource::None).into_result()?;

        let change = StatusChange::Approve {
            approved_by: actor.id.clone(),
        };
        let event = self
            .events
            .apply_status_change(id, &change, Utc::now())
            .await?
            .ok_or(ServiceError::NotFound("Event"))?;

        tracing::info!(event_id = %id, approved_by = %actor.id, "Event approved");
        Ok(event)
    }

    pub async fn archive(&self, actor: &Account, id: &str) -> Result<Event, ServiceError> {
        decide(Actor::from(actor), Action::ArchiveEvent, Resource::None).into_result()?;

        let event = self
            .events
            .apply_status_change(id, &StatusChange::Archive, Utc::now())
            .await?
            .ok_or(ServiceError::NotFound("Event"))?;

        tracing::info!(event_id = %id, user_id = %actor.id, "Event archived");
        Ok(event)
    }

    /// Deletes the event and every attachment stored for it.
    pub async fn delete(&self, actor: &Account, id: &str) -> Result<(), ServiceError> {
        decide(Actor::from(actor), Action::DeleteEvent, Resource::None).into_result()?;

        if !self.events.delete_event(id).await? {
            return Err(ServiceError::NotFound("Event"));
        }

        for attachment in self.attachments.list_attachments(id).await? {
            if let Err(e) = self.storage.delete(&attachment.storage_key).await {
                tracing::warn!(
                    file_id = %attachment.id,
                    error = %e,
                    "Failed to remove attachment bytes"
                );
            }
            self.attachments.delete_attachment(&attachment.id).await?;
        }

        tracing::info!(event_id = %id, user_id = %actor.id, "Event deleted");
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String, ServiceError> {
    let title = title.trim();
    let chars = title.chars().count();
    if chars == 0 || chars > MAX_TITLE_CHARS {
        return Err(ServiceError::Validation(format!(
            "Title must be between 1 and {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_schedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::Validation(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}
