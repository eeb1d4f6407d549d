use crate::{config::Config, server::rate_limit::RateLimiter};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling
    pub http_client: Client,
    /// Per-IP request limiter; `None` when RATE_LIMIT_RPM is 0
    pub rate_limiter: Option<RateLimiter>,
    /// Prometheus render handle for the /metrics endpoint
    pub metrics: PrometheusHandle,
    /// Process start, for the health endpoint's uptime
    pub started: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config, metrics: PrometheusHandle) -> Self {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        let rate_limiter =
            (config.rate_limit_rpm > 0).then(|| RateLimiter::new(config.rate_limit_rpm));

        Self {
            config: Arc::new(config),
            http_client,
            rate_limiter,
            metrics,
            started: Instant::now(),
        }
    }
}
