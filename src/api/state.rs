use crate::core::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    // Shared so outbound connections are pooled across requests
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}
