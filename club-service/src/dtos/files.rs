use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Attachment;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttachmentView {
    pub id: String,
    pub event_id: String,
    pub uploader_id: String,
    #[schema(example = "agenda.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentView {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            event_id: a.event_id,
            uploader_id: a.uploader_id,
            filename: a.filename,
            mime_type: a.mime_type,
            size: a.size,
            uploaded_at: a.uploaded_at,
        }
    }
}
