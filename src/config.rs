//! Runtime configuration shared by the controllers

use std::time::Duration;

use crate::controller::retry::RetryConfig;

/// Default interval between periodic re-checks of a reconciled object
pub const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(3600);

/// Default timeout for registry index probes
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Delay used when a reconcile asks to be retried right away
pub const RETRY_NOW_DELAY: Duration = Duration::from_millis(500);

/// Operator settings collected from the command line and passed to every controller
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// How long to wait before re-checking a successfully reconciled object
    pub requeue_interval: Duration,
    /// Timeout applied to each registry index request
    pub http_timeout: Duration,
    /// Budget for status writes that hit a version conflict
    pub status_retry: RetryConfig,
    /// Whether the admission webhook server is started
    pub enable_webhook: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            status_retry: RetryConfig::status_update(),
            enable_webhook: false,
        }
    }
}

impl OperatorConfig {
    pub fn with_requeue_interval(mut self, interval: Duration) -> Self {
        self.requeue_interval = interval;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
