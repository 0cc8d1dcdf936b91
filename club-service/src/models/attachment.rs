use super::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File stored in object storage and attached to an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub uploader_id: String,
    pub filename: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(
        event_id: String,
        uploader_id: String,
        filename: String,
        mime_type: String,
        size: i64,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let storage_key = format!("events/{}/{}", event_id, id);
        Self {
            id,
            event_id,
            uploader_id,
            filename,
            storage_key,
            mime_type,
            size,
            uploaded_at: Utc::now(),
        }
    }
}
