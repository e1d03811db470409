//! Request handlers behind the HTTP routes. Each takes the agent and a decoded
//! body and returns either a response body or an [`ApiError`] carrying the
//! HTTP status to send.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GatewayError, ListEventsError, PlanError};
use crate::handlers::executor::{ActionOutcome, ExecutionLog};
use crate::models::action::Action;
use crate::models::event::RemoteEvent;
use crate::service::agent::CalendarAgent;

const MAX_PAGE_SIZE: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        ApiError::new(502, err.to_string())
    }
}

impl From<ListEventsError> for ApiError {
    fn from(err: ListEventsError) -> Self {
        let status = match &err {
            ListEventsError::Time(_) => 400,
            ListEventsError::Gateway(GatewayError::NotFound(_)) => 404,
            ListEventsError::Gateway(GatewayError::BackendUnavailable(_)) => 503,
            ListEventsError::Gateway(GatewayError::BackendRejected(_)) => 502,
        };
        ApiError::new(status, err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub ok: bool,
    pub error: String,
}

impl From<&ApiError> for ErrorMessage {
    fn from(err: &ApiError) -> Self {
        Self {
            ok: false,
            error: err.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub ok: bool,
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// False when any action did not fully complete.
    pub ok: bool,
    pub executed: usize,
    pub logs: Vec<String>,
    pub outcomes: Vec<ActionOutcome>,
}

impl From<ExecutionLog> for ExecuteResponse {
    fn from(log: ExecutionLog) -> Self {
        Self {
            ok: log.failures() == 0,
            executed: log.outcomes.len(),
            logs: log.outcomes.iter().flat_map(|o| o.lines.iter().cloned()).collect(),
            outcomes: log.outcomes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub prompt: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub ok: bool,
    pub dry_run: bool,
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecuteResponse>,
}

#[derive(Debug, Deserialize)]
pub struct EventsRequest {
    pub from_datetime: String,
    pub to_datetime: String,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub ok: bool,
    pub count: usize,
    pub events: Vec<RemoteEvent>,
}

pub fn health() -> HealthResponse {
    HealthResponse { status: "ok" }
}

pub async fn parse(agent: &CalendarAgent, request: ParseRequest) -> Result<ParseResponse, ApiError> {
    let prompt = non_empty_prompt(&request.prompt)?;
    let actions = agent.plan(prompt).await.inspect_err(|e| warn!(error = %e, "parse failed"))?;
    Ok(ParseResponse { ok: true, actions })
}

pub async fn execute(agent: &CalendarAgent, request: ExecuteRequest) -> ExecuteResponse {
    agent.execute(&request.actions).await.into()
}

pub async fn run(agent: &CalendarAgent, request: RunRequest) -> Result<RunResponse, ApiError> {
    let prompt = non_empty_prompt(&request.prompt)?;
    let report = agent
        .run(prompt, request.dry_run)
        .await
        .inspect_err(|e| warn!(error = %e, "run failed"))?;
    let result = report.log.map(ExecuteResponse::from);
    Ok(RunResponse {
        ok: result.as_ref().is_none_or(|r| r.ok),
        dry_run: request.dry_run,
        actions: report.actions,
        result,
    })
}

pub async fn events(agent: &CalendarAgent, request: EventsRequest) -> Result<EventsResponse, ApiError> {
    let limit = request.page_size.clamp(1, MAX_PAGE_SIZE);
    let events = agent
        .list_events(
            &request.from_datetime,
            &request.to_datetime,
            request.time_zone.as_deref(),
            limit,
        )
        .await?;
    Ok(EventsResponse {
        ok: true,
        count: events.len(),
        events,
    })
}

fn non_empty_prompt(prompt: &str) -> Result<&str, ApiError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::new(400, "prompt must not be empty"));
    }
    Ok(prompt)
}
