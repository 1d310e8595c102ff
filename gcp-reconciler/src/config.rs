use crate::auditlogs::RECEIVE_ADAPTER_NAME;
use clap::Parser;
use std::time::Duration;

/// Reconciles CloudAuditLogsSources into Topics, PullSubscriptions and Stackdriver sinks.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ControllerConfig {
    /// Number of sources reconciled in parallel
    #[arg(long, env = "CONTROLLER_CONCURRENCY", default_value_t = 2)]
    pub concurrency: u16,

    /// Only watch this namespace, all namespaces when left out
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// First requeue delay of a failing source, in milliseconds
    #[arg(long, env = "BACKOFF_BASE_MS", default_value_t = 5)]
    pub backoff_base_ms: u64,

    /// Longest requeue delay of a failing source, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value_t = 1000)]
    pub backoff_max_secs: u64,

    /// Requeue delay of a reconciled source, in seconds
    #[arg(long, env = "RESYNC_SECS", default_value_t = 600)]
    pub resync_secs: u64,

    /// Value of the receive adapter label set on Topics and PullSubscriptions
    #[arg(long, env = "RECEIVE_ADAPTER_NAME", default_value = RECEIVE_ADAPTER_NAME)]
    pub receive_adapter_name: String,

    /// Timeout of a single Google API call, in seconds
    #[arg(long, env = "CLOUD_TIMEOUT_SECS", default_value_t = 30)]
    pub cloud_timeout_secs: u64,

    /// Serve every Google API from this base URL, e.g. an emulator
    #[arg(long, env = "CLOUD_ENDPOINT")]
    pub cloud_endpoint: Option<String>,

    /// Log as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ControllerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn resync(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud_timeout_secs)
    }
}
