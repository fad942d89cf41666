use log::info;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base, e.g. `http://localhost:8080/api`.
    pub api_url: String,
    /// Push channel base, e.g. `ws://localhost:8080`.
    pub ws_url: String,
    pub ws_max_retries: u32,
    pub ws_retry_delay: Duration,
    pub request_timeout: Duration,
    pub page_size: u32,
    pub idempotency_keys: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080".to_string(),
            ws_max_retries: 5,
            ws_retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(15),
            page_size: 20,
            idempotency_keys: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            api_url: env::var("SKILLLINK_API_URL").unwrap_or(defaults.api_url),
            ws_url: env::var("SKILLLINK_WS_URL").unwrap_or(defaults.ws_url),
            ws_max_retries: env::var("SKILLLINK_WS_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ws_max_retries),
            ws_retry_delay: env::var("SKILLLINK_WS_RETRY_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ws_retry_delay),
            request_timeout: env::var("SKILLLINK_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            page_size: env::var("SKILLLINK_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.page_size),
            idempotency_keys: env::var("SKILLLINK_IDEMPOTENCY_KEYS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.idempotency_keys),
        };

        info!("Client configuration loaded:");
        info!("  API: {}", config.api_url);
        info!("  Push channels: {}", config.ws_url);
        info!("  Reconnect: {} attempts every {:?}", config.ws_max_retries, config.ws_retry_delay);

        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }
}
