use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::clients::openai_client::{self, OpenAISettings};
use crate::error::OracleError;
use crate::service::retry::RetryPolicy;

#[async_trait]
pub trait OpenAIClient: Send + Sync {
    async fn generate_prompt(&self, prompt: &str, prompt_type: &str) -> Result<String, OracleError>;
}

pub struct OpenAIService {
    http: reqwest::Client,
    settings: OpenAISettings,
    retry: RetryPolicy,
    time_zone: Tz,
}

impl OpenAIService {
    pub fn new(settings: OpenAISettings, retry: RetryPolicy, time_zone: Tz) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            retry,
            time_zone,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.time_zone).date_naive()
    }

    async fn generate_prompt_internal(
        &self,
        prompt: &str,
        prompt_type: &str,
    ) -> Result<String, OracleError> {
        let today = self.today();
        let zone = self.time_zone.name();
        let mut attempt = 0;
        loop {
            let result = openai_client::generate_openai_prompt(
                &self.http,
                &self.settings,
                prompt,
                prompt_type,
                today,
                zone,
            )
            .await;

            match result {
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    let Some(delay) = self.retry.delay_for(attempt) else {
                        warn!(prompt_type, attempts = attempt, error = %err, "giving up on oracle");
                        return Err(err);
                    };
                    info!(prompt_type, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying oracle call");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl OpenAIClient for OpenAIService {
    async fn generate_prompt(&self, prompt: &str, prompt_type: &str) -> Result<String, OracleError> {
        self.generate_prompt_internal(prompt, prompt_type).await
    }
}
