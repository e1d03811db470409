use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::clients::openai_client::ACTION_PLAN;
use crate::error::PlanError;
use crate::models::action::Action;
use crate::service::openai_service::OpenAIClient;

/// Turns a free-text instruction into an ordered batch of actions.
pub struct ActionPlanner {
    openai: Arc<dyn OpenAIClient>,
}

impl ActionPlanner {
    pub fn new(openai: Arc<dyn OpenAIClient>) -> Self {
        Self { openai }
    }

    pub async fn plan(&self, instruction: &str) -> Result<Vec<Action>, PlanError> {
        let reply = self.openai.generate_prompt(instruction, ACTION_PLAN).await?;
        let actions = parse_plan(&reply)?;
        if actions.is_empty() {
            warn!("oracle reply carried neither `actions` nor `command`");
        }
        info!(count = actions.len(), "planned actions");
        Ok(actions)
    }
}

/// Reshapes an oracle reply into a batch.
///
/// `{"actions": [...]}` yields the list in order, `{"command": ...}` yields a
/// one-element batch, anything else that is still valid JSON yields an empty
/// batch.
pub fn parse_plan(reply: &str) -> Result<Vec<Action>, PlanError> {
    let cleaned = clean_json_response(reply);
    let data: Value = serde_json::from_str(cleaned)
        .map_err(|e| PlanError::OracleResponseMalformed(format!("{}: {}", e, cleaned)))?;

    let Value::Object(mut object) = data else {
        return Ok(Vec::new());
    };

    if let Some(Value::Array(items)) = object.remove("actions") {
        return Ok(items.into_iter().map(Action::from_value).collect());
    }
    if object.contains_key("command") {
        return Ok(vec![Action::from_value(Value::Object(object))]);
    }
    Ok(Vec::new())
}

/// Strips code fences or chatter around the JSON payload, which starts at the
/// first `{`.
pub fn clean_json_response(content: &str) -> &str {
    let content = content.trim();
    if content.starts_with("```") {
        for part in content.split("```") {
            if let Some(start) = part.find('{') {
                return part[start..].trim();
            }
        }
        return content;
    }
    match content.find('{') {
        Some(start) if start > 0 => trim_trailing_chatter(&content[start..]),
        _ => content,
    }
}

fn trim_trailing_chatter(content: &str) -> &str {
    match content.rfind('}') {
        Some(end) => &content[..=end],
        None => content,
    }
}
