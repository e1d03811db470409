use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::clients::google_calendar::GoogleCalendarSettings;
use crate::clients::openai_client::OpenAISettings;
use crate::error::ConfigError;
use crate::service::retry::RetryPolicy;
use crate::service::time_resolver;

const DEFAULT_TIME_ZONE: &str = "Asia/Jerusalem";
const DEFAULT_GOOGLE_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Raw `KEY=VALUE` pairs from an optional config file.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::File(format!("{}: {}", path, e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::File(format!("invalid config line {}: {}", idx + 1, line)));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Cli,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarBackend {
    Google,
    Memory,
}

/// Typed view over config file and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub run_mode: RunMode,
    pub default_time_zone: String,
    pub openai: OpenAISettings,
    pub retry: RetryPolicy,
    pub backend: CalendarBackend,
    /// Present when `backend` is `Google`.
    pub google: Option<GoogleCalendarSettings>,
    pub api_port: u16,
}

impl Settings {
    /// `lookup` answers a key from whatever sources the caller layered
    /// (config file first, then process environment in the binary).
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let run_mode = match get("RUN_MODE").as_deref() {
            None | Some("cli") => RunMode::Cli,
            Some("api") => RunMode::Api,
            Some(other) => return Err(invalid("RUN_MODE", other, "expected `cli` or `api`")),
        };

        let default_time_zone = get("DEFAULT_TIME_ZONE").unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
        time_resolver::parse_zone(&default_time_zone)
            .map_err(|e| invalid("DEFAULT_TIME_ZONE", &default_time_zone, &e.to_string()))?;

        let timeout = Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), 30)?);

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY".to_string()))?;
        let mut openai = OpenAISettings::new(api_key);
        if let Some(model) = get("OPENAI_MODEL") {
            openai.model = model;
        }
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            openai.base_url = base_url;
        }
        openai.max_tokens = parse_or("OPENAI_MAX_TOKENS", get("OPENAI_MAX_TOKENS"), openai.max_tokens)?;
        openai.timeout = timeout;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            parse_or("ORACLE_MAX_RETRIES", get("ORACLE_MAX_RETRIES"), defaults.max_retries)?,
            Duration::from_millis(parse_or(
                "ORACLE_RETRY_BASE_MS",
                get("ORACLE_RETRY_BASE_MS"),
                defaults.base_delay.as_millis() as u64,
            )?),
        );

        let backend = match get("CALENDAR_BACKEND").as_deref() {
            None | Some("google") => CalendarBackend::Google,
            Some("memory") => CalendarBackend::Memory,
            Some(other) => return Err(invalid("CALENDAR_BACKEND", other, "expected `google` or `memory`")),
        };

        let google = match backend {
            CalendarBackend::Memory => None,
            CalendarBackend::Google => Some(GoogleCalendarSettings {
                base_url: get("GOOGLE_API_BASE_URL").unwrap_or_else(|| DEFAULT_GOOGLE_BASE_URL.to_string()),
                calendar_id: get("GOOGLE_CALENDAR_ID").unwrap_or_else(|| "primary".to_string()),
                access_token: get("GOOGLE_ACCESS_TOKEN")
                    .ok_or_else(|| ConfigError::Missing("GOOGLE_ACCESS_TOKEN".to_string()))?,
                timeout,
            }),
        };

        let api_port = parse_or("API_PORT", get("API_PORT"), 8000)?;

        Ok(Self {
            run_mode,
            default_time_zone,
            openai,
            retry,
            backend,
            google,
            api_port,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| invalid(key, &value, &e.to_string())),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn parses_config_file_lines() {
        let config = AppConfig::parse(
            "# comment\n\nexport OPENAI_API_KEY=\"sk-test\"\nRUN_MODE = api\nGOOGLE_CALENDAR_ID='work'\n",
        )
        .unwrap();
        assert_eq!(config.get("OPENAI_API_KEY").as_deref(), Some("sk-test"));
        assert_eq!(config.get("RUN_MODE").as_deref(), Some("api"));
        assert_eq!(config.get("GOOGLE_CALENDAR_ID").as_deref(), Some("work"));
        assert!(AppConfig::parse("not a pair").is_err());
    }

    #[test]
    fn defaults_apply_for_memory_backend() {
        let settings = Settings::load(lookup(&[("OPENAI_API_KEY", "sk"), ("CALENDAR_BACKEND", "memory")])).unwrap();
        assert_eq!(settings.run_mode, RunMode::Cli);
        assert_eq!(settings.default_time_zone, "Asia/Jerusalem");
        assert_eq!(settings.openai.model, "gpt-4o");
        assert_eq!(settings.openai.max_tokens, 1500);
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.api_port, 8000);
        assert!(settings.google.is_none());
    }

    #[test]
    fn google_backend_needs_a_token() {
        assert_eq!(
            Settings::load(lookup(&[("OPENAI_API_KEY", "sk")])).unwrap_err(),
            ConfigError::Missing("GOOGLE_ACCESS_TOKEN".to_string())
        );
        let settings = Settings::load(lookup(&[("OPENAI_API_KEY", "sk"), ("GOOGLE_ACCESS_TOKEN", "ya29")])).unwrap();
        let google = settings.google.unwrap();
        assert_eq!(google.calendar_id, "primary");
        assert_eq!(google.base_url, DEFAULT_GOOGLE_BASE_URL);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            Settings::load(lookup(&[])).unwrap_err(),
            ConfigError::Missing("OPENAI_API_KEY".to_string())
        );
        assert!(matches!(
            Settings::load(lookup(&[("OPENAI_API_KEY", "sk"), ("DEFAULT_TIME_ZONE", "Mars/Olympus")])),
            Err(ConfigError::Invalid { key, .. }) if key == "DEFAULT_TIME_ZONE"
        ));
        assert!(matches!(
            Settings::load(lookup(&[
                ("OPENAI_API_KEY", "sk"),
                ("CALENDAR_BACKEND", "memory"),
                ("API_PORT", "eighty"),
            ])),
            Err(ConfigError::Invalid { key, .. }) if key == "API_PORT"
        ));
    }
}
