//! Web search used to ground a completion in fresh results.

use std::time::Duration;

use serde_json::Value;

use crate::core::{AppConfig, RelayError, fetch_with_retry};

/// Query the search provider and return its JSON document as-is.
pub async fn web_search(
    client: &reqwest::Client,
    config: &AppConfig,
    api_key: &str,
    query: &str,
) -> Result<Value, RelayError> {
    let response = fetch_with_retry("search provider", &config.retry, || {
        client
            .get(&config.search_api_url)
            .bearer_auth(api_key)
            .query(&[("q", query)])
            .timeout(Duration::from_secs(30))
    })
    .await?;

    response
        .json::<Value>()
        .await
        .map_err(|e| RelayError::UpstreamConnection {
            service: "search provider",
            reason: format!("Invalid search response: {}", e),
        })
}

/// Build the system message content that carries the search results.
pub fn search_context(system_message: &str, results: &Value) -> String {
    let rendered = serde_json::to_string_pretty(results).unwrap_or_else(|_| results.to_string());
    format!("{}\n\nWeb search results:\n{}", system_message, rendered)
}
