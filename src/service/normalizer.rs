use tracing::warn;

use crate::models::action::{Action, EventDraft, EventFilter, WallTime};
use crate::service::time_resolver;

/// Rewrites every wall-clock time in a batch into an RFC 3339 timestamp with
/// the offset of its zone on that date.
///
/// Returns a fresh batch in the same order; the input is never touched. A
/// field that fails to resolve is left as it was and the executor reports the
/// failure for that item.
#[derive(Debug, Clone)]
pub struct ActionNormalizer {
    default_zone: String,
}

impl ActionNormalizer {
    pub fn new(default_zone: impl Into<String>) -> Self {
        Self {
            default_zone: default_zone.into(),
        }
    }

    pub fn default_zone(&self) -> &str {
        &self.default_zone
    }

    pub fn normalize(&self, actions: &[Action]) -> Vec<Action> {
        actions.iter().map(|action| self.normalize_action(action)).collect()
    }

    fn normalize_action(&self, action: &Action) -> Action {
        match action {
            Action::AddEvent { events } => Action::AddEvent {
                events: events.iter().map(|draft| self.normalize_draft(draft)).collect(),
            },
            Action::DeleteEvent { filter } => Action::DeleteEvent {
                filter: self.normalize_filter(filter),
            },
            Action::QueryEvent { question, filter } => Action::QueryEvent {
                question: question.clone(),
                filter: self.normalize_filter(filter),
            },
            other => other.clone(),
        }
    }

    fn normalize_draft(&self, draft: &EventDraft) -> EventDraft {
        let zone = draft.zone_id().unwrap_or(&self.default_zone).to_string();
        EventDraft {
            summary: draft.summary.clone(),
            start: resolve_wall_time(&draft.start, &zone),
            end: resolve_wall_time(&draft.end, &zone),
        }
    }

    fn normalize_filter(&self, filter: &EventFilter) -> EventFilter {
        let zone = filter.zone_id().unwrap_or(&self.default_zone);
        EventFilter {
            text: filter.text.clone(),
            from: resolve_field(&filter.from, zone),
            to: resolve_field(&filter.to, zone),
            time_zone: filter.time_zone.clone(),
        }
    }
}

fn resolve_wall_time(time: &WallTime, zone: &str) -> WallTime {
    WallTime {
        date_time: resolve_field(&time.date_time, zone),
        time_zone: Some(time.zone_id().unwrap_or(zone).to_string()),
    }
}

fn resolve_field(value: &str, zone: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }
    match time_resolver::resolve(value, zone) {
        Ok(resolved) => resolved.to_string(),
        Err(err) => {
            warn!(value, zone, error = %err, "leaving unresolvable time as-is");
            value.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_event(start: &str, start_zone: Option<&str>, end: &str, end_zone: Option<&str>) -> Action {
        Action::AddEvent {
            events: vec![EventDraft {
                summary: "Lesson".to_string(),
                start: WallTime {
                    date_time: start.to_string(),
                    time_zone: start_zone.map(str::to_string),
                },
                end: WallTime {
                    date_time: end.to_string(),
                    time_zone: end_zone.map(str::to_string),
                },
            }],
        }
    }

    fn first_draft(actions: &[Action]) -> &EventDraft {
        match &actions[0] {
            Action::AddEvent { events } => &events[0],
            other => panic!("expected add_event, got {:?}", other),
        }
    }

    #[test]
    fn start_zone_governs_both_ends() {
        let normalizer = ActionNormalizer::new("Asia/Jerusalem");
        let input = vec![add_event(
            "2025-07-01T09:00:00",
            Some("America/New_York"),
            "2025-07-01T10:00:00",
            Some("Europe/London"),
        )];
        let out = normalizer.normalize(&input);
        let draft = first_draft(&out);
        assert_eq!(draft.start.date_time, "2025-07-01T09:00:00-04:00");
        assert_eq!(draft.end.date_time, "2025-07-01T10:00:00-04:00");
        assert_eq!(draft.end.time_zone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn end_zone_used_when_start_has_none() {
        let normalizer = ActionNormalizer::new("Asia/Jerusalem");
        let input = vec![add_event(
            "2025-07-01T09:00:00",
            None,
            "2025-07-01T10:00:00",
            Some("Europe/London"),
        )];
        let out = normalizer.normalize(&input);
        let draft = first_draft(&out);
        assert_eq!(draft.start.date_time, "2025-07-01T09:00:00+01:00");
        assert_eq!(draft.start.time_zone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn default_zone_applies_to_filters() {
        let normalizer = ActionNormalizer::new("Asia/Jerusalem");
        let input = vec![Action::from_value(json!({
            "command": "query_event",
            "question": "What do I have?",
            "filters": {"from": "2025-11-01T00:00:00", "to": "2025-11-02T23:59:59"}
        }))];
        let out = normalizer.normalize(&input);
        match &out[0] {
            Action::QueryEvent { question, filter } => {
                assert_eq!(question, "What do I have?");
                assert_eq!(filter.from, "2025-11-01T00:00:00+02:00");
                assert_eq!(filter.to, "2025-11-02T23:59:59+02:00");
            }
            other => panic!("expected query_event, got {:?}", other),
        }
    }

    #[test]
    fn does_not_touch_input_and_keeps_order() {
        let normalizer = ActionNormalizer::new("Asia/Jerusalem");
        let input = vec![
            Action::GeneralAnswer {
                answer: "hello".to_string(),
            },
            add_event("2025-11-05T09:00:00", None, "2025-11-05T10:00:00", None),
            Action::from_value(json!({"command": "dance"})),
        ];
        let snapshot = input.clone();
        let out = normalizer.normalize(&input);
        assert_eq!(input, snapshot);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], input[0]);
        assert_eq!(out[2], input[2]);
        assert_eq!(first_draft(&out[1..]).start.date_time, "2025-11-05T09:00:00+02:00");
    }

    #[test]
    fn normalizing_twice_does_not_shift() {
        let normalizer = ActionNormalizer::new("America/New_York");
        let input = vec![add_event("2025-03-01T09:00:00", None, "2025-03-01T10:00:00", None)];
        let once = normalizer.normalize(&input);
        let twice = normalizer.normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unresolvable_field_is_left_unchanged() {
        let normalizer = ActionNormalizer::new("Asia/Jerusalem");
        let input = vec![add_event("soon", None, "2025-11-05T10:00:00", None)];
        let out = normalizer.normalize(&input);
        let draft = first_draft(&out);
        assert_eq!(draft.start.date_time, "soon");
        assert_eq!(draft.end.date_time, "2025-11-05T10:00:00+02:00");
    }
}
