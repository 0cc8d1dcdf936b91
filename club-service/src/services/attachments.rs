use std::sync::Arc;

use crate::models::{Account, Attachment};
use crate::services::{
    access::{decide, Action, Actor, Resource},
    error::ServiceError,
    storage::ObjectStorage,
    store::{AttachmentStore, EventStore},
};

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct AttachmentService {
    events: Arc<dyn EventStore>,
    attachments: Arc<dyn AttachmentStore>,
    storage: Arc<dyn ObjectStorage>,
    max_upload_bytes: usize,
}

impl AttachmentService {
    pub fn new(
        events: Arc<dyn EventStore>,
        attachments: Arc<dyn AttachmentStore>,
        storage: Arc<dyn ObjectStorage>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            events,
            attachments,
            storage,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Attaching a file counts as modifying the event.
    pub async fn upload(
        &self,
        actor: &Account,
        event_id: &str,
        upload: Upload,
    ) -> Result<Attachment, ServiceError> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(ServiceError::NotFound("Event"))?;
        decide(
            Actor::from(actor),
            Action::UpdateEvent,
            Resource::Event {
                organizer_id: &event.organizer_id,
            },
        )
        .into_result()?;

        if upload.bytes.is_empty() {
            return Err(ServiceError::Validation("File is empty".to_string()));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::Validation(format!(
                "File exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }

        let filename = sanitize_filename(&upload.filename);
        let attachment = Attachment::new(
            event.id.clone(),
            actor.id.clone(),
            filename,
            upload.mime_type,
            upload.bytes.len() as i64,
        );

        self.storage
            .upload(&attachment.storage_key, upload.bytes)
            .await?;
        if let Err(e) = self.attachments.insert_attachment(&attachment).await {
            let _ = self.storage.delete(&attachment.storage_key).await;
            return Err(e);
        }

        tracing::info!(
            file_id = %attachment.id,
            event_id = %event.id,
            size = attachment.size,
            "Attachment uploaded"
        );
        Ok(attachment)
    }

    pub async fn list(&self, event_id: &str) -> Result<Vec<Attachment>, ServiceError> {
        if self.events.find_event(event_id).await?.is_none() {
            return Err(ServiceError::NotFound("Event"));
        }
        self.attachments.list_attachments(event_id).await
    }

    pub async fn download(&self, id: &str) -> Result<(Attachment, Vec<u8>), ServiceError> {
        let attachment = self
            .attachments
            .find_attachment(id)
            .await?
            .ok_or(ServiceError::NotFound("File"))?;
        let bytes = self.storage.download(&attachment.storage_key).await?;
        Ok((attachment, bytes))
    }

    pub async fn delete(&self, actor: &Account, id: &str) -> Result<(), ServiceError> {
        let attachment = self
            .attachments
            .find_attachment(id)
            .await?
            .ok_or(ServiceError::NotFound("File"))?;

        // Files of an already deleted event fall back to admin-only.
        let event = self.events.find_event(&attachment.event_id).await?;
        let resource = match &event {
            Some(event) => Resource::Event {
                organizer_id: &event.organizer_id,
            },
            None => Resource::None,
        };
        decide(Actor::from(actor), Action::UpdateEvent, resource).into_result()?;

        self.storage.delete(&attachment.storage_key).await?;
        self.attachments.delete_attachment(id).await?;

        tracing::info!(file_id = %id, user_id = %actor.id, "Attachment deleted");
        Ok(())
    }
}

/// Keeps only the final path segment of a client-supplied name.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "file".to_string()
    } else {
        base.chars().take(255).collect()
    }
}
