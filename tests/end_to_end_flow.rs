use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calendarAgent::error::OracleError;
use calendarAgent::handlers::executor::OutcomeStatus;
use calendarAgent::models::action::Action;
use calendarAgent::service::agent::CalendarAgent;
use calendarAgent::service::memory_calendar::MemoryCalendar;
use calendarAgent::service::openai_service::OpenAIClient;

struct FakeOpenAI {
    responses: Mutex<VecDeque<String>>,
}

impl FakeOpenAI {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl OpenAIClient for FakeOpenAI {
    async fn generate_prompt(&self, _prompt: &str, _prompt_type: &str) -> Result<String, OracleError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OracleError::EmptyResponse)
    }
}

const TWO_MEETINGS: &str = r#"{"actions": [{"command": "add_event", "events": [
    {"summary": "Sync with Dana", "start": {"dateTime": "2025-11-06T13:00:00", "timeZone": "Asia/Jerusalem"},
     "end": {"dateTime": "2025-11-06T13:30:00", "timeZone": "Asia/Jerusalem"}},
    {"summary": "Design review", "start": {"dateTime": "2025-11-06T17:00:00"},
     "end": {"dateTime": "2025-11-06T19:00:00"}}
]}]}"#;

#[tokio::test]
async fn instruction_with_two_meetings_creates_both() {
    let calendar = Arc::new(MemoryCalendar::new());
    let openai = Arc::new(FakeOpenAI::new(&[TWO_MEETINGS]));
    let agent = CalendarAgent::new(openai, calendar.clone(), "Asia/Jerusalem");

    let report = agent
        .run("tomorrow a 30 minute sync with Dana at 13:00 and a two hour design review at 17:00", false)
        .await
        .unwrap();

    let log = report.log.unwrap();
    assert_eq!(log.outcomes.len(), 1);
    assert_eq!(log.outcomes[0].status, OutcomeStatus::Completed);
    assert!(log.outcomes[0].lines.iter().all(|l| l.starts_with("Event Created: memory://events/")));

    let stored = calendar.snapshot().await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].title, "Sync with Dana");
    assert_eq!(stored[0].start.to_string(), "2025-11-06T13:00:00+02:00");
    assert_eq!(stored[0].start.duration_until(&stored[0].end).num_minutes(), 30);
    assert_eq!(stored[1].start.to_string(), "2025-11-06T17:00:00+02:00");
    assert_eq!(stored[1].start.duration_until(&stored[1].end).num_minutes(), 120);
}

#[tokio::test]
async fn planned_actions_are_not_rewritten_by_execution() {
    let calendar = Arc::new(MemoryCalendar::new());
    let openai = Arc::new(FakeOpenAI::new(&[TWO_MEETINGS]));
    let agent = CalendarAgent::new(openai, calendar, "Asia/Jerusalem");

    let actions = agent.plan("two meetings tomorrow").await.unwrap();
    let before = actions.clone();
    agent.execute(&actions).await;

    assert_eq!(actions, before);
    let Action::AddEvent { events } = &actions[0] else {
        panic!("expected add_event");
    };
    assert_eq!(events[1].start.date_time, "2025-11-06T17:00:00");
    assert_eq!(events[1].start.time_zone, None);
}

#[tokio::test]
async fn add_then_delete_by_title() {
    let calendar = Arc::new(MemoryCalendar::new());
    let openai = Arc::new(FakeOpenAI::new(&[
        TWO_MEETINGS,
        r#"{"command": "delete_event", "filters": {"text": "review", "from": "2025-11-06T00:00:00", "to": "2025-11-06T23:59:59"}}"#,
        r#"{"answer": "Deleting the design review.", "delete_titles": ["Design review"]}"#,
    ]));
    let agent = CalendarAgent::new(openai, calendar.clone(), "Asia/Jerusalem");

    agent.run("two meetings tomorrow", false).await.unwrap();
    let report = agent.run("cancel the review tomorrow", false).await.unwrap();

    let log = report.log.unwrap();
    assert_eq!(
        log.render(),
        "Answer: Deleting the design review.\n\
         Preparing to delete 1 matching titles.\n\
         Event Deleted: Design review\n"
    );
    let remaining: Vec<String> = calendar.snapshot().await.into_iter().map(|e| e.title).collect();
    assert_eq!(remaining, vec!["Sync with Dana".to_string()]);
}

#[tokio::test]
async fn malformed_plan_is_an_error() {
    let calendar = Arc::new(MemoryCalendar::new());
    let openai = Arc::new(FakeOpenAI::new(&["Sorry, what?"]));
    let agent = CalendarAgent::new(openai, calendar, "Asia/Jerusalem");

    assert!(agent.run("hmm", false).await.is_err());
}
