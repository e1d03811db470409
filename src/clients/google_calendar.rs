use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::models::event::{InsertedEvent, NewEvent, RemoteEvent};
use crate::models::time::AbsoluteTime;
use crate::service::calendar_gateway::CalendarGateway;

const PAGE_SIZE: &str = "250";

#[derive(Debug, Clone)]
pub struct GoogleCalendarSettings {
    pub base_url: String,
    pub calendar_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct EventTimeBody<'a> {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertBody<'a> {
    summary: &'a str,
    start: EventTimeBody<'a>,
    end: EventTimeBody<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResponse {
    id: String,
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    location: Option<String>,
    description: Option<String>,
    recurring_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiEventTime {
    fn render(self) -> Option<String> {
        self.date_time.or(self.date)
    }
}

impl From<ApiEvent> for RemoteEvent {
    fn from(event: ApiEvent) -> Self {
        RemoteEvent {
            id: event.id,
            title: event.summary.unwrap_or_default(),
            start: event.start.and_then(ApiEventTime::render),
            end: event.end.and_then(ApiEventTime::render),
            location: event.location,
            description: event.description,
            recurring_event_id: event.recurring_event_id,
        }
    }
}

/// Google Calendar v3 over REST with a bearer token.
pub struct GoogleCalendarGateway {
    http: reqwest::Client,
    settings: GoogleCalendarSettings,
}

impl GoogleCalendarGateway {
    pub fn new(settings: GoogleCalendarSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn events_url(&self, event_id: Option<&str>) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|e| GatewayError::BackendRejected(format!("invalid base url: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                GatewayError::BackendRejected("base url cannot carry a path".to_string())
            })?;
            segments
                .pop_if_empty()
                .extend(["calendars", self.settings.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.settings.access_token)
            .timeout(self.settings.timeout)
    }

    async fn fetch_page(
        &self,
        from: &AbsoluteTime,
        to: &AbsoluteTime,
        page_token: Option<&str>,
    ) -> Result<EventsPage, GatewayError> {
        let mut query = vec![
            ("timeMin", from.to_string()),
            ("timeMax", to.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let request = self.http.get(self.events_url(None)?).query(&query);
        let response = self.authorized(request).send().await?;
        let response = check_status(response, &self.settings.calendar_id).await?;
        Ok(response.json::<EventsPage>().await?)
    }
}

async fn check_status(response: Response, subject: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "calendar request failed");
    Err(match status.as_u16() {
        404 | 410 => GatewayError::NotFound(subject.to_string()),
        429 | 500..=599 => GatewayError::BackendUnavailable(format!("status {}: {}", status, body)),
        _ => GatewayError::BackendRejected(format!("status {}: {}", status, body)),
    })
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn insert(&self, event: &NewEvent) -> Result<InsertedEvent, GatewayError> {
        let body = InsertBody {
            summary: &event.summary,
            start: EventTimeBody {
                date_time: event.start.to_string(),
                time_zone: &event.time_zone,
            },
            end: EventTimeBody {
                date_time: event.end.to_string(),
                time_zone: &event.time_zone,
            },
        };

        let request = self.http.post(self.events_url(None)?).json(&body);
        let response = self.authorized(request).send().await?;
        let response = check_status(response, &self.settings.calendar_id).await?;
        let created: InsertResponse = response.json().await?;
        debug!(id = %created.id, "event inserted");
        Ok(InsertedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }

    async fn list(
        &self,
        from: &AbsoluteTime,
        to: &AbsoluteTime,
    ) -> Result<Vec<RemoteEvent>, GatewayError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.fetch_page(from, to, page_token.as_deref()).await?;
            events.extend(
                page.items
                    .into_iter()
                    .filter(|e| e.status.as_deref() != Some("cancelled"))
                    .map(RemoteEvent::from),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(count = events.len(), "listed events");
        Ok(events)
    }

    async fn delete(&self, event_id: &str) -> Result<(), GatewayError> {
        let request = self.http.delete(self.events_url(Some(event_id))?);
        let response = self.authorized(request).send().await?;
        check_status(response, event_id).await?;
        debug!(id = %event_id, "event deleted");
        Ok(())
    }
}
