use super::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Approved,
    Archived,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Archived => "archived",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "archived" => Ok(EventStatus::Archived),
            _ => Err(format!("Invalid event status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub organizer_id: String,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        organizer_id: String,
        title: String,
        description: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            organizer_id,
            start_time,
            end_time,
            status: EventStatus::Pending,
            approved_by: None,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field changes requested on an existing event. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}

/// Lifecycle transition applied in a single conditional write.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Approve { approved_by: String },
    Archive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc};

    #[test]
    fn status_defaults_to_pending() {
        let stored = doc! {
            "_id": "ev-1",
            "title": "Kickoff",
            "organizer_id": "acc-1",
            "start_time": "2024-06-01T18:00:00",
            "end_time": "2024-06-01T20:00:00",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z",
        };

        let event: Event = bson::from_document(stored).unwrap();
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.description, "");
        assert!(event.archived_at.is_none());
    }

    #[test]
    fn parses_status_filter() {
        assert_eq!("approved".parse::<EventStatus>().unwrap(), EventStatus::Approved);
        assert!("done".parse::<EventStatus>().is_err());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(EventPatch::default().is_empty());
        let patch = EventPatch {
            title: Some("New".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
