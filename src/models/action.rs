use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const ADD_EVENT: &str = "add_event";
pub const DELETE_EVENT: &str = "delete_event";
pub const QUERY_EVENT: &str = "query_event";
pub const GENERAL_ANSWER: &str = "general_answer";

/// A wall-clock reading paired with the zone it should be read in.
///
/// After normalization `date_time` holds an RFC 3339 string with an explicit
/// offset instead of the naive local reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl WallTime {
    pub fn new(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: date_time.into(),
            time_zone: Some(time_zone.into()),
        }
    }

    pub fn zone_id(&self) -> Option<&str> {
        self.time_zone.as_deref().map(str::trim).filter(|z| !z.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub summary: String,
    pub start: WallTime,
    pub end: WallTime,
}

impl EventDraft {
    /// The zone both ends of the draft are read in: the start's zone wins
    /// over the end's. `None` means the configured default applies.
    pub fn zone_id(&self) -> Option<&str> {
        self.start.zone_id().or_else(|| self.end.zone_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventFilter {
    pub fn zone_id(&self) -> Option<&str> {
        self.time_zone.as_deref().map(str::trim).filter(|z| !z.is_empty())
    }
}

/// One command proposed by the planner.
///
/// Known commands are validated at the JSON boundary. Anything else is kept
/// as-is so it can be reported at execution time instead of failing the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddEvent { events: Vec<EventDraft> },
    DeleteEvent { filter: EventFilter },
    QueryEvent { question: String, filter: EventFilter },
    GeneralAnswer { answer: String },
    /// A command tag we do not handle, or no tag at all.
    Unrecognized { command: Option<String>, payload: Value },
    /// A known command tag whose fields did not validate.
    Invalid {
        command: String,
        reason: String,
        payload: Value,
    },
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum WireAction {
    AddEvent {
        #[serde(default)]
        events: Vec<EventDraft>,
    },
    DeleteEvent {
        filters: EventFilter,
    },
    QueryEvent {
        #[serde(default)]
        question: String,
        filters: EventFilter,
    },
    GeneralAnswer {
        #[serde(default)]
        answer: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum WireActionRef<'a> {
    AddEvent { events: &'a [EventDraft] },
    DeleteEvent { filters: &'a EventFilter },
    QueryEvent { question: &'a str, filters: &'a EventFilter },
    GeneralAnswer { answer: &'a str },
}

impl From<WireAction> for Action {
    fn from(wire: WireAction) -> Self {
        match wire {
            WireAction::AddEvent { events } => Action::AddEvent { events },
            WireAction::DeleteEvent { filters } => Action::DeleteEvent { filter: filters },
            WireAction::QueryEvent { question, filters } => Action::QueryEvent {
                question,
                filter: filters,
            },
            WireAction::GeneralAnswer { answer } => Action::GeneralAnswer {
                answer: answer.unwrap_or_default(),
            },
        }
    }
}

impl Action {
    /// Validates one action object coming from the oracle or an API caller.
    pub fn from_value(value: Value) -> Action {
        let value = unwrap_payload(value);
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string);

        match command.as_deref() {
            Some(ADD_EVENT | DELETE_EVENT | QUERY_EVENT | GENERAL_ANSWER) => {
                match serde_json::from_value::<WireAction>(value.clone()) {
                    Ok(wire) => wire.into(),
                    Err(err) => Action::Invalid {
                        command: command.clone().unwrap_or_default(),
                        reason: err.to_string(),
                        payload: value,
                    },
                }
            }
            _ => Action::Unrecognized {
                command,
                payload: value,
            },
        }
    }

    pub fn command_name(&self) -> Option<&str> {
        match self {
            Action::AddEvent { .. } => Some(ADD_EVENT),
            Action::DeleteEvent { .. } => Some(DELETE_EVENT),
            Action::QueryEvent { .. } => Some(QUERY_EVENT),
            Action::GeneralAnswer { .. } => Some(GENERAL_ANSWER),
            Action::Unrecognized { command, .. } => command.as_deref(),
            Action::Invalid { command, .. } => Some(command.as_str()),
        }
    }
}

// API callers sometimes send `{"command": ..., "payload": {...}}`.
fn unwrap_payload(value: Value) -> Value {
    let Value::Object(mut object) = value else {
        return value;
    };
    match object.remove("payload") {
        Some(Value::Object(payload)) => {
            let mut merged = Map::new();
            merged.insert(
                "command".to_string(),
                object.remove("command").unwrap_or(Value::Null),
            );
            merged.extend(payload);
            Value::Object(merged)
        }
        Some(other) => {
            object.insert("payload".to_string(), other);
            Value::Object(object)
        }
        None => Value::Object(object),
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Action::AddEvent { events } => WireActionRef::AddEvent { events }.serialize(serializer),
            Action::DeleteEvent { filter } => {
                WireActionRef::DeleteEvent { filters: filter }.serialize(serializer)
            }
            Action::QueryEvent { question, filter } => WireActionRef::QueryEvent {
                question,
                filters: filter,
            }
            .serialize(serializer),
            Action::GeneralAnswer { answer } => {
                WireActionRef::GeneralAnswer { answer }.serialize(serializer)
            }
            Action::Unrecognized { payload, .. } | Action::Invalid { payload, .. } => {
                payload.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Action::from_value(value))
    }
}
