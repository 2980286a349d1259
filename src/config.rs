use chrono::TimeDelta;
use std::time::Duration;

/// Default lifetime of a verification artifact.
pub const DEFAULT_ARTIFACT_TTL_DAYS: i64 = 30;

/// Tunables shared by the lifecycle service, the artifact service and the
/// reconciliation job. Built once at process start.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline for each catalog, gateway or store call made on a request path.
    pub call_timeout: Duration,
    /// Deadline for a generation started in the background by a webhook.
    pub generation_timeout: Duration,
    /// Deadline for the missing-artifact listing and for each generation attempt
    /// during a reconciliation sweep.
    pub sweep_timeout: Duration,
    /// Maximum number of generation attempts a sweep runs at once.
    pub sweep_concurrency: usize,
    /// Pause between periodic sweeps.
    pub sweep_interval: Duration,
    /// `None` issues non-expiring artifacts.
    pub artifact_ttl: Option<TimeDelta>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(10),
            sweep_timeout: Duration::from_secs(30),
            sweep_concurrency: 4,
            sweep_interval: Duration::from_secs(60),
            artifact_ttl: Some(TimeDelta::days(DEFAULT_ARTIFACT_TTL_DAYS)),
        }
    }
}
