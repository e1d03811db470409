use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::event::{InsertedEvent, NewEvent, RemoteEvent};
use crate::models::time::AbsoluteTime;
use crate::service::calendar_gateway::CalendarGateway;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: String,
    pub title: String,
    pub start: AbsoluteTime,
    pub end: AbsoluteTime,
    pub location: Option<String>,
    pub description: Option<String>,
    pub recurring_event_id: Option<String>,
}

impl StoredEvent {
    pub fn new(title: impl Into<String>, start: AbsoluteTime, end: AbsoluteTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            start,
            end,
            location: None,
            description: None,
            recurring_event_id: None,
        }
    }

    fn to_remote(&self) -> RemoteEvent {
        RemoteEvent {
            id: self.id.clone(),
            title: self.title.clone(),
            start: Some(self.start.to_string()),
            end: Some(self.end.to_string()),
            location: self.location.clone(),
            description: self.description.clone(),
            recurring_event_id: self.recurring_event_id.clone(),
        }
    }
}

/// A calendar kept in process memory. Handy for local runs without backend
/// credentials.
#[derive(Debug, Default)]
pub struct MemoryCalendar {
    events: Mutex<Vec<StoredEvent>>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<StoredEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    pub async fn snapshot(&self) -> Vec<StoredEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl CalendarGateway for MemoryCalendar {
    async fn insert(&self, event: &NewEvent) -> Result<InsertedEvent, GatewayError> {
        if event.summary.trim().is_empty() {
            return Err(GatewayError::BackendRejected("event summary is empty".to_string()));
        }
        let stored = StoredEvent::new(event.summary.clone(), event.start, event.end);
        let inserted = InsertedEvent {
            id: stored.id.clone(),
            html_link: Some(format!("memory://events/{}", stored.id)),
        };
        debug!(id = %stored.id, title = %stored.title, "stored event in memory");
        self.events.lock().await.push(stored);
        Ok(inserted)
    }

    async fn list(
        &self,
        from: &AbsoluteTime,
        to: &AbsoluteTime,
    ) -> Result<Vec<RemoteEvent>, GatewayError> {
        let events = self.events.lock().await;
        let mut matching: Vec<&StoredEvent> = events
            .iter()
            .filter(|e| e.start < *to && e.end > *from)
            .collect();
        matching.sort_by_key(|e| e.start);
        Ok(matching.into_iter().map(StoredEvent::to_remote).collect())
    }

    async fn delete(&self, event_id: &str) -> Result<(), GatewayError> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(GatewayError::NotFound(event_id.to_string()));
        }
        Ok(())
    }
}
