use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Base URL of the analysis service
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Interval between status queries for a deferred task
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay between two processor iterations
    #[serde(default = "default_reschedule_delay_ms")]
    pub reschedule_delay_ms: u64,

    /// Status queries allowed per task before giving up (0 = unbounded)
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Prometheus scrape address (e.g., "127.0.0.1:9100"). Disabled when unset.
    pub metrics_addr: Option<String>,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_reschedule_delay_ms() -> u64 {
    10
}

fn default_max_poll_attempts() -> u32 {
    300
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reschedule_delay: Duration::from_millis(self.reschedule_delay_ms),
            max_poll_attempts: (self.max_poll_attempts > 0).then_some(self.max_poll_attempts),
        }
    }
}

/// Timing knobs for the upload queue and the status poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub reschedule_delay: Duration,
    /// `None` polls until the server reports a terminal status.
    pub max_poll_attempts: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            reschedule_delay: Duration::from_millis(default_reschedule_delay_ms()),
            max_poll_attempts: Some(default_max_poll_attempts()),
        }
    }
}
