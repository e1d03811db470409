use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use calendarAgent::cli;
use calendarAgent::clients::google_calendar::GoogleCalendarGateway;
use calendarAgent::config::{AppConfig, CalendarBackend, RunMode, Settings};
use calendarAgent::error::ConfigError;
use calendarAgent::runtime;
use calendarAgent::service::agent::CalendarAgent;
use calendarAgent::service::calendar_gateway::CalendarGateway;
use calendarAgent::service::memory_calendar::MemoryCalendar;
use calendarAgent::service::openai_service::OpenAIService;
use calendarAgent::service::time_resolver;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let agent = match build_agent(&settings) {
        Ok(agent) => Arc::new(agent),
        Err(e) => {
            error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    match settings.run_mode {
        RunMode::Api => runtime::run_api(agent, settings.api_port).await,
        RunMode::Cli => cli::cli(agent).await,
    }
    ExitCode::SUCCESS
}

fn load_settings() -> Result<Settings, ConfigError> {
    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)?,
        Err(_) => AppConfig::default(),
    };
    Settings::load(|key| config.get(key).or_else(|| env::var(key).ok()))
}

fn build_agent(settings: &Settings) -> Result<CalendarAgent, ConfigError> {
    let zone = time_resolver::parse_zone(&settings.default_time_zone).map_err(|e| ConfigError::Invalid {
        key: "DEFAULT_TIME_ZONE".to_string(),
        value: settings.default_time_zone.clone(),
        reason: e.to_string(),
    })?;
    let openai = Arc::new(OpenAIService::new(settings.openai.clone(), settings.retry, zone));

    let gateway: Arc<dyn CalendarGateway> = match (settings.backend, &settings.google) {
        (CalendarBackend::Google, Some(google)) => Arc::new(GoogleCalendarGateway::new(google.clone())),
        (CalendarBackend::Google, None) => return Err(ConfigError::Missing("GOOGLE_ACCESS_TOKEN".to_string())),
        (CalendarBackend::Memory, _) => Arc::new(MemoryCalendar::new()),
    };
    info!(backend = ?settings.backend, zone = %settings.default_time_zone, "calendar agent configured");

    Ok(CalendarAgent::new(openai, gateway, settings.default_time_zone.clone()))
}
