use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{ListEventsError, PlanError, TimeError};
use crate::handlers::executor::{CommandExecutor, ExecutionLog};
use crate::models::action::Action;
use crate::models::event::RemoteEvent;
use crate::service::calendar_gateway::CalendarGateway;
use crate::service::normalizer::ActionNormalizer;
use crate::service::openai_service::OpenAIClient;
use crate::service::planner::ActionPlanner;
use crate::service::time_resolver::resolve;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub actions: Vec<Action>,
    /// `None` for a dry run.
    pub log: Option<ExecutionLog>,
}

/// Plan, normalize, execute. One instance per configured oracle and calendar.
pub struct CalendarAgent {
    planner: ActionPlanner,
    normalizer: ActionNormalizer,
    executor: CommandExecutor,
    gateway: Arc<dyn CalendarGateway>,
}

impl CalendarAgent {
    pub fn new(
        openai: Arc<dyn OpenAIClient>,
        gateway: Arc<dyn CalendarGateway>,
        default_zone: impl Into<String>,
    ) -> Self {
        let default_zone = default_zone.into();
        Self {
            planner: ActionPlanner::new(openai.clone()),
            normalizer: ActionNormalizer::new(default_zone.clone()),
            executor: CommandExecutor::new(openai, default_zone),
            gateway,
        }
    }

    pub fn default_zone(&self) -> &str {
        self.normalizer.default_zone()
    }

    pub async fn plan(&self, instruction: &str) -> Result<Vec<Action>, PlanError> {
        self.planner.plan(instruction).await
    }

    pub async fn execute(&self, actions: &[Action]) -> ExecutionLog {
        let normalized = self.normalizer.normalize(actions);
        self.executor.execute(&normalized, self.gateway.as_ref()).await
    }

    pub async fn run(&self, instruction: &str, dry_run: bool) -> Result<RunReport, PlanError> {
        let actions = self.plan(instruction).await?;
        if dry_run {
            info!(count = actions.len(), "dry run, nothing executed");
            return Ok(RunReport { actions, log: None });
        }
        let log = self.execute(&actions).await;
        Ok(RunReport {
            actions,
            log: Some(log),
        })
    }

    /// Lists events between two readings in `zone` (default zone when `None`),
    /// at most `limit` of them.
    pub async fn list_events(
        &self,
        from: &str,
        to: &str,
        zone: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RemoteEvent>, ListEventsError> {
        let zone = zone
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .unwrap_or(self.default_zone());
        let from = resolve(from, zone)?;
        let to = resolve(to, zone)?;
        if from >= to {
            return Err(TimeError::InvertedInterval {
                start: from.to_string(),
                end: to.to_string(),
            }
            .into());
        }
        let mut events = self.gateway.list(&from, &to).await?;
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::models::time::AbsoluteTime;
    use crate::service::memory_calendar::{MemoryCalendar, StoredEvent};
    use async_trait::async_trait;

    struct FixedOpenAI(String);

    #[async_trait]
    impl OpenAIClient for FixedOpenAI {
        async fn generate_prompt(&self, _prompt: &str, _prompt_type: &str) -> Result<String, OracleError> {
            Ok(self.0.clone())
        }
    }

    fn at(value: &str) -> AbsoluteTime {
        AbsoluteTime::parse(value).unwrap()
    }

    #[tokio::test]
    async fn dry_run_plans_without_touching_the_calendar() {
        let calendar = Arc::new(MemoryCalendar::new());
        let reply = r#"{"command":"add_event","events":[{"summary":"Lunch",
            "start":{"dateTime":"2025-11-05T13:00:00"},"end":{"dateTime":"2025-11-05T14:00:00"}}]}"#;
        let agent = CalendarAgent::new(Arc::new(FixedOpenAI(reply.to_string())), calendar.clone(), "Asia/Jerusalem");

        let report = agent.run("lunch on wednesday", true).await.unwrap();
        assert_eq!(report.actions.len(), 1);
        assert!(report.log.is_none());
        assert!(calendar.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn list_events_uses_default_zone_and_limit() {
        let calendar = Arc::new(MemoryCalendar::with_events(vec![
            StoredEvent::new("A", at("2025-11-05T09:00:00+02:00"), at("2025-11-05T10:00:00+02:00")),
            StoredEvent::new("B", at("2025-11-05T11:00:00+02:00"), at("2025-11-05T12:00:00+02:00")),
        ]));
        let agent = CalendarAgent::new(Arc::new(FixedOpenAI("{}".to_string())), calendar, "Asia/Jerusalem");

        let events = agent
            .list_events("2025-11-05T00:00:00", "2025-11-05T23:59:59", None, 1)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "A");

        let err = agent
            .list_events("2025-11-06T00:00:00", "2025-11-05T00:00:00", Some(" "), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ListEventsError::Time(TimeError::InvertedInterval { .. })));
    }

    #[tokio::test]
    async fn list_events_ignores_offsets_on_the_range() {
        let calendar = Arc::new(MemoryCalendar::with_events(vec![StoredEvent::new(
            "A",
            at("2025-11-05T09:00:00+02:00"),
            at("2025-11-05T09:30:00+02:00"),
        )]));
        let agent = CalendarAgent::new(Arc::new(FixedOpenAI("{}".to_string())), calendar, "UTC");

        let events = agent
            .list_events("2025-11-05T09:00:00Z", "2025-11-05T10:00:00", Some("Asia/Jerusalem"), 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn offset_on_a_draft_does_not_hide_an_unknown_zone() {
        let calendar = Arc::new(MemoryCalendar::new());
        let agent = CalendarAgent::new(Arc::new(FixedOpenAI("{}".to_string())), calendar.clone(), "Asia/Jerusalem");
        let action = Action::from_value(serde_json::json!({
            "command": "add_event",
            "events": [{
                "summary": "Launch",
                "start": {"dateTime": "2025-11-05T09:00:00Z", "timeZone": "Mars/Olympus"},
                "end": {"dateTime": "2025-11-05T10:00:00Z", "timeZone": "Mars/Olympus"}
            }]
        }));

        let log = agent.execute(&[action]).await;

        assert_eq!(
            log.outcomes[0].lines,
            vec!["Failed to create 'Launch': unknown time zone: \"Mars/Olympus\"".to_string()]
        );
        assert!(calendar.snapshot().await.is_empty());
    }
}
