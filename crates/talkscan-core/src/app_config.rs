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

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub subjects_path: PathBuf,
    pub output_dir: PathBuf,
    pub webdriver_url: String,
    /// Pre-authenticated session to attach to instead of creating one.
    pub webdriver_session_id: Option<String>,
    pub browser_args: Vec<String>,
    pub request_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub settle_ms: u64,
    pub poll_ms: u64,
    pub max_expand_rounds: u32,
    pub max_listing_iterations: u32,
    pub max_stalled_iterations: u32,
    pub too_old_streak: u32,
    pub detail_max_scrolls: u32,
    pub inter_navigation_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub utc_offset_hours: i32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("subjects_path", &self.subjects_path)
            .field("output_dir", &self.output_dir)
            .field("webdriver_url", &self.webdriver_url)
            .field(
                "webdriver_session_id",
                &self.webdriver_session_id.as_ref().map(|_| "[redacted]"),
            )
            .field("browser_args", &self.browser_args)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("settle_ms", &self.settle_ms)
            .field("poll_ms", &self.poll_ms)
            .field("max_expand_rounds", &self.max_expand_rounds)
            .field("max_listing_iterations", &self.max_listing_iterations)
            .field("max_stalled_iterations", &self.max_stalled_iterations)
            .field("too_old_streak", &self.too_old_streak)
            .field("detail_max_scrolls", &self.detail_max_scrolls)
            .field(
                "inter_navigation_delay_ms",
                &self.inter_navigation_delay_ms,
            )
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_secs", &self.retry_backoff_base_secs)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .finish()
    }
}
