use std::env;
use std::time::Duration;

use super::error::RelayError;

/// Bounds for the resilient fetcher. Attempts are `1 + max_retries`
/// and the delay doubles after every failed attempt.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    // When set, no new attempt starts once this much time has passed
    // since the first one.
    pub retry_window: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            retry_window: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub search_api_url: String,
    pub search_api_key: Option<String>,
    pub system_message: String,
    pub expose_error_details: bool,
    pub retry: RetryPolicy,
}

/// Both provider secrets, only obtainable when neither is missing.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub openai_api_key: String,
    pub search_api_key: String,
}

impl AppConfig {
    /// Returns the provider secrets or the name of the first missing
    /// one. Called before any outbound request is made.
    pub fn credentials(&self) -> Result<Credentials, RelayError> {
        let openai_api_key = non_empty(&self.openai_api_key)
            .ok_or_else(|| RelayError::Configuration("RELAY_LLM_API_KEY".to_string()))?;
        let search_api_key = non_empty(&self.search_api_key)
            .ok_or_else(|| RelayError::Configuration("RELAY_SEARCH_API_KEY".to_string()))?;
        Ok(Credentials {
            openai_api_key,
            search_api_key,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

impl Default for AppConfig {
    fn default() -> Self {
        let openai_api_hostname = env::var("RELAY_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key = env::var("RELAY_LLM_API_KEY").ok();
        let openai_model =
            env::var("RELAY_LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());
        let search_api_url = env::var("RELAY_SEARCH_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/search".to_string());
        let search_api_key = env::var("RELAY_SEARCH_API_KEY").ok();
        let system_message = env::var("RELAY_SYSTEM_MESSAGE").unwrap_or_else(|_| {
            "You are a helpful assistant. Answer using the web search results below when they are relevant.".to_string()
        });
        let expose_error_details = env::var("RELAY_ENV")
            .map(|v| v != "production")
            .unwrap_or(true);

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: env::var("RELAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            initial_delay: env_millis("RELAY_RETRY_DELAY_MS").unwrap_or(defaults.initial_delay),
            retry_window: env_millis("RELAY_RETRY_WINDOW_MS"),
        };

        Self {
            openai_api_hostname,
            openai_api_key,
            openai_model,
            search_api_url,
            search_api_key,
            system_message,
            expose_error_details,
            retry,
        }
    }
}
