use serde::{Deserialize, Serialize};

use crate::models::time::AbsoluteTime;

/// An event ready to be written: both ends resolved to absolute instants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: AbsoluteTime,
    pub end: AbsoluteTime,
    pub time_zone: String,
}

/// What the backend hands back after an insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

impl InsertedEvent {
    /// Link for humans when the backend provides one, the id otherwise.
    pub fn reference(&self) -> &str {
        self.html_link.as_deref().unwrap_or(&self.id)
    }
}

/// Read-only snapshot of an event stored in the calendar.
///
/// `start`/`end` carry the backend's own rendering: an RFC 3339 timestamp for
/// timed events, a plain date for all-day ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub title: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub recurring_event_id: Option<String>,
}

impl RemoteEvent {
    pub fn is_recurring(&self) -> bool {
        self.recurring_event_id.is_some()
    }
}

/// The reduced view of a [`RemoteEvent`] sent to the oracle for query answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventProjection {
    pub title: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: String,
    pub description: String,
    pub recurring: bool,
}

impl From<&RemoteEvent> for EventProjection {
    fn from(event: &RemoteEvent) -> Self {
        Self {
            title: event.title.clone(),
            start: event.start.clone(),
            end: event.end.clone(),
            location: event.location.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
            recurring: event.is_recurring(),
        }
    }
}
