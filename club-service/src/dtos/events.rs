use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::{Event, EventPatch, EventStatus};
use crate::services::EventDraft;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_schedule"))]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    #[schema(example = "Board game night")]
    pub title: String,

    #[serde(default)]
    #[schema(example = "Bring your favourite game")]
    pub description: String,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

fn validate_create_schedule(req: &CreateEventRequest) -> Result<(), ValidationError> {
    if req.end_time <= req.start_time {
        let mut err = ValidationError::new("schedule");
        err.message = Some("End time must be after start time".into());
        return Err(err);
    }
    Ok(())
}

impl From<CreateEventRequest> for EventDraft {
    fn from(req: CreateEventRequest) -> Self {
        EventDraft {
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        EventPatch {
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEventsQuery {
    /// `pending`, `approved` or `archived`.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub organizer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub approved_by: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventView {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            organizer_id: e.organizer_id,
            start_time: e.start_time,
            end_time: e.end_time,
            status: e.status,
            approved_by: e.approved_by,
            archived_at: e.archived_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}
