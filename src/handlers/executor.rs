use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::clients::openai_client::CALENDAR_QUERY;
use crate::error::{GatewayError, TimeError};
use crate::models::action::{ADD_EVENT, Action, DELETE_EVENT, EventDraft, EventFilter, QUERY_EVENT};
use crate::models::event::{EventProjection, InsertedEvent, NewEvent};
use crate::models::time::AbsoluteTime;
use crate::service::calendar_gateway::CalendarGateway;
use crate::service::openai_service::OpenAIClient;
use crate::service::planner::clean_json_response;
use crate::service::time_resolver::resolve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    PartiallyCompleted,
    Failed,
    UnknownCommand,
}

/// The single record produced for one action of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub command: Option<String>,
    pub status: OutcomeStatus,
    pub lines: Vec<String>,
}

impl ActionOutcome {
    fn new(command: Option<&str>, status: OutcomeStatus, lines: Vec<String>) -> Self {
        Self {
            command: command.map(str::to_string),
            status,
            lines,
        }
    }

    fn failed(command: &str, line: String) -> Self {
        Self::new(Some(command), OutcomeStatus::Failed, vec![line])
    }

    fn tally(command: &str, successes: usize, failures: usize, lines: Vec<String>) -> Self {
        let status = match (successes, failures) {
            (_, 0) => OutcomeStatus::Completed,
            (0, _) => OutcomeStatus::Failed,
            _ => OutcomeStatus::PartiallyCompleted,
        };
        Self::new(Some(command), status, lines)
    }
}

/// Outcomes of one batch, in action order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionLog {
    pub batch_id: String,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionLog {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.outcomes.iter().flat_map(|o| o.lines.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Completed)
            .count()
    }
}

/// Answer and deletion list from the resolution pass of a query/delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResolution {
    pub answer: Option<String>,
    pub delete_titles: Vec<String>,
}

#[derive(Error, Debug)]
enum DraftError {
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Dispatches each action of a batch to the calendar, one at a time and in
/// order. A failing action never stops the rest of the batch.
pub struct CommandExecutor {
    openai: Arc<dyn OpenAIClient>,
    default_zone: String,
}

impl CommandExecutor {
    pub fn new(openai: Arc<dyn OpenAIClient>, default_zone: impl Into<String>) -> Self {
        Self {
            openai,
            default_zone: default_zone.into(),
        }
    }

    pub async fn execute(&self, actions: &[Action], gateway: &dyn CalendarGateway) -> ExecutionLog {
        let batch_id = Uuid::new_v4().to_string();
        let span = info_span!("batch", batch_id = %batch_id, actions = actions.len());
        let outcomes = async {
            let mut outcomes = Vec::with_capacity(actions.len());
            for (index, action) in actions.iter().enumerate() {
                let outcome = self.dispatch(action, gateway).await;
                info!(index, command = ?outcome.command, status = ?outcome.status, "action finished");
                outcomes.push(outcome);
            }
            outcomes
        }
        .instrument(span)
        .await;

        ExecutionLog { batch_id, outcomes }
    }

    async fn dispatch(&self, action: &Action, gateway: &dyn CalendarGateway) -> ActionOutcome {
        match action {
            Action::AddEvent { events } => self.add_events(events, gateway).await,
            Action::DeleteEvent { filter } => {
                let question = format!(
                    "delete all events matching '{}'",
                    filter.text.as_deref().unwrap_or_default()
                );
                self.resolve_query(DELETE_EVENT, &question, filter, gateway).await
            }
            Action::QueryEvent { question, filter } => {
                self.resolve_query(QUERY_EVENT, question, filter, gateway).await
            }
            Action::GeneralAnswer { answer } => ActionOutcome::new(
                action.command_name(),
                OutcomeStatus::Completed,
                vec![format!("Answer: {}", answer)],
            ),
            Action::Unrecognized { command, .. } => ActionOutcome::new(
                command.as_deref(),
                OutcomeStatus::UnknownCommand,
                vec![format!("Unknown command: {}", command.as_deref().unwrap_or("<none>"))],
            ),
            Action::Invalid {
                command, reason, ..
            } => ActionOutcome::failed(command, format!("Invalid {} command: {}", command, reason)),
        }
    }

    async fn add_events(&self, drafts: &[EventDraft], gateway: &dyn CalendarGateway) -> ActionOutcome {
        let command = ADD_EVENT;
        if drafts.is_empty() {
            return ActionOutcome::new(
                Some(command),
                OutcomeStatus::Completed,
                vec!["No events to add.".to_string()],
            );
        }

        let mut lines = Vec::with_capacity(drafts.len());
        let (mut created, mut failed) = (0, 0);
        for draft in drafts {
            match self.add_one(draft, gateway).await {
                Ok(inserted) => {
                    created += 1;
                    lines.push(format!("Event Created: {}", inserted.reference()));
                }
                Err(err) => {
                    failed += 1;
                    warn!(summary = %draft.summary, error = %err, "failed to create event");
                    lines.push(format!("Failed to create '{}': {}", draft.summary, err));
                }
            }
        }
        ActionOutcome::tally(command, created, failed, lines)
    }

    async fn add_one(
        &self,
        draft: &EventDraft,
        gateway: &dyn CalendarGateway,
    ) -> Result<InsertedEvent, DraftError> {
        let event = self.resolve_draft(draft)?;
        Ok(gateway.insert(&event).await?)
    }

    /// Both ends in one zone, start strictly before end.
    pub fn resolve_draft(&self, draft: &EventDraft) -> Result<NewEvent, TimeError> {
        let zone = draft.zone_id().unwrap_or(&self.default_zone);
        let start = resolve(&draft.start.date_time, zone)?;
        let end = resolve(&draft.end.date_time, zone)?;
        if start >= end {
            return Err(TimeError::InvertedInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(NewEvent {
            summary: draft.summary.clone(),
            start,
            end,
            time_zone: zone.to_string(),
        })
    }

    async fn resolve_query(
        &self,
        command: &str,
        question: &str,
        filter: &EventFilter,
        gateway: &dyn CalendarGateway,
    ) -> ActionOutcome {
        let zone = filter.zone_id().unwrap_or(&self.default_zone);
        let range = resolve(&filter.from, zone).and_then(|from| Ok((from, resolve(&filter.to, zone)?)));
        let (from, to) = match range {
            Ok(range) => range,
            Err(err) => return ActionOutcome::failed(command, format!("Invalid date range: {}", err)),
        };

        let events = match gateway.list(&from, &to).await {
            Ok(events) => events,
            Err(err) => return ActionOutcome::failed(command, format!("Failed to fetch events: {}", err)),
        };
        if events.is_empty() {
            return ActionOutcome::new(
                Some(command),
                OutcomeStatus::Completed,
                vec!["Answer: no events found in the given time range.".to_string()],
            );
        }

        let projection: Vec<EventProjection> = events.iter().map(EventProjection::from).collect();
        let events_json = match serde_json::to_string(&projection) {
            Ok(json) => json,
            Err(err) => return ActionOutcome::failed(command, format!("Failed to encode events: {}", err)),
        };
        let prompt = build_query_prompt(question, &from, &to, &events_json);

        let reply = match self.openai.generate_prompt(&prompt, CALENDAR_QUERY).await {
            Ok(reply) => reply,
            Err(err) => return ActionOutcome::failed(command, format!("Failed to call oracle: {}", err)),
        };
        let Some(resolution) = parse_resolution(&reply) else {
            warn!(reply = %reply, "oracle resolution is not a JSON object");
            return ActionOutcome::failed(
                command,
                format!("Oracle returned invalid JSON:\n{}", clean_json_response(&reply)),
            );
        };

        let mut lines = Vec::new();
        let (mut successes, mut failures) = (0, 0);
        if let Some(answer) = &resolution.answer {
            successes += 1;
            lines.push(format!("Answer: {}", answer));
        }
        if !resolution.delete_titles.is_empty() {
            lines.push(format!(
                "Preparing to delete {} matching titles.",
                resolution.delete_titles.len()
            ));
            let report = delete_by_titles(gateway, &from, &to, &resolution.delete_titles, &mut lines).await;
            successes += report.deleted;
            failures += report.failed;
        }
        if lines.is_empty() {
            lines.push("Answer: nothing to report.".to_string());
        }
        ActionOutcome::tally(command, successes, failures, lines)
    }
}

#[derive(Debug, Default)]
struct DeleteReport {
    deleted: usize,
    failed: usize,
}

// Titles match exactly. Two events sharing a title in range are both removed.
async fn delete_by_titles(
    gateway: &dyn CalendarGateway,
    from: &AbsoluteTime,
    to: &AbsoluteTime,
    titles: &[String],
    lines: &mut Vec<String>,
) -> DeleteReport {
    let mut report = DeleteReport::default();
    let events = match gateway.list(from, to).await {
        Ok(events) => events,
        Err(err) => {
            report.failed += 1;
            lines.push(format!("Failed to fetch events for deletion: {}", err));
            return report;
        }
    };

    let mut matched = false;
    for event in events.iter().filter(|e| titles.contains(&e.title)) {
        matched = true;
        match gateway.delete(&event.id).await {
            Ok(()) => {
                report.deleted += 1;
                lines.push(format!("Event Deleted: {}", event.title));
            }
            Err(GatewayError::NotFound(_)) => {
                report.deleted += 1;
                lines.push(format!("Event already deleted: {}", event.title));
            }
            Err(err) => {
                report.failed += 1;
                warn!(id = %event.id, title = %event.title, error = %err, "delete failed");
                lines.push(format!("Failed to delete '{}': {}", event.title, err));
            }
        }
    }
    if !matched {
        lines.push("No events matched the titles to delete.".to_string());
    }
    report
}

pub fn build_query_prompt(
    question: &str,
    from: &AbsoluteTime,
    to: &AbsoluteTime,
    events_json: &str,
) -> String {
    format!(
        "User query:\n{question}\n\n\
         Date range:\nfrom={from}\nto={to}\n\n\
         Events JSON:\n{events_json}\n\
         Return ONLY a single JSON object as specified."
    )
}

/// `None` when the reply is not a JSON object at all. Missing keys just mean
/// "not applicable".
pub fn parse_resolution(reply: &str) -> Option<QueryResolution> {
    let value: Value = serde_json::from_str(clean_json_response(reply)).ok()?;
    let object = value.as_object()?;

    let answer = object
        .get("answer")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let delete_titles = object
        .get("delete_titles")
        .and_then(Value::as_array)
        .map(|titles| {
            titles
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(QueryResolution {
        answer,
        delete_titles,
    })
}
