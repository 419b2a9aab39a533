use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Per-service outbound rate limits, expressed as calls per one-minute
/// sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    pub research_per_minute: usize,
    pub writer_per_minute: usize,
    pub image_per_minute: usize,
    pub publish_per_minute: usize,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Optional YAML file overriding the built-in prompt templates.
    pub templates_path: Option<PathBuf>,

    pub research_url: String,
    pub research_api_key: String,
    pub writer_url: String,
    pub writer_api_key: String,
    pub writer_model: String,
    pub image_url: Option<String>,
    pub image_api_key: Option<String>,
    pub cms_url: Option<String>,
    pub cms_token: Option<String>,

    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,

    pub limits: ServiceLimits,
    /// Longest a pipeline step will wait for a free rate-limit slot.
    pub limiter_max_wait_secs: u64,

    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("templates_path", &self.templates_path)
            .field("research_url", &self.research_url)
            .field("research_api_key", &"[redacted]")
            .field("writer_url", &self.writer_url)
            .field("writer_api_key", &"[redacted]")
            .field("writer_model", &self.writer_model)
            .field("image_url", &self.image_url)
            .field(
                "image_api_key",
                &self.image_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("cms_url", &self.cms_url)
            .field("cms_token", &self.cms_token.as_ref().map(|_| "[redacted]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("limits", &self.limits)
            .field("limiter_max_wait_secs", &self.limiter_max_wait_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}
