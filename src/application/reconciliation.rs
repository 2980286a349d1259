use super::artifacts::ArtifactService;
use super::with_deadline;
use crate::config::ServiceConfig;
use crate::domain::ports::OrderStoreRef;
use crate::error::{BookingError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Outcome counts of one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub skipped_in_flight: usize,
    pub generated: usize,
    pub no_longer_eligible: usize,
    pub failed: usize,
}

enum Outcome {
    Generated,
    InFlight,
    NotEligible,
    Failed,
}

/// Background repair of successful orders that never received an artifact,
/// e.g. because the process stopped between the webhook and generation.
///
/// Sweeps go through the same [`ArtifactService`] as the webhook path, so they
/// share its in-flight guard and never race a live generation.
pub struct ReconciliationJob {
    store: OrderStoreRef,
    artifacts: Arc<ArtifactService>,
    concurrency: usize,
    attempt_timeout: Duration,
}

impl ReconciliationJob {
    pub fn new(
        store: OrderStoreRef,
        artifacts: Arc<ArtifactService>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            concurrency: config.sweep_concurrency.max(1),
            attempt_timeout: config.sweep_timeout,
        }
    }

    /// Runs one pass over every order missing an artifact, with at most
    /// `concurrency` generation attempts in flight.
    ///
    /// Individual failures are counted, never propagated; only failing to list
    /// candidates (including a listing that outlives the sweep deadline) aborts
    /// the sweep.
    #[instrument(skip(self))]
    pub async fn sweep_missing_artifacts(&self) -> Result<SweepReport> {
        let candidates = with_deadline(
            "missing-artifact scan",
            self.attempt_timeout,
            self.store.orders_missing_artifact(),
        )
        .await?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for order in candidates {
            if self.artifacts.is_generation_in_progress(&order.order_id) {
                debug!(order_id = %order.order_id, "Skipping order with generation in flight");
                report.skipped_in_flight += 1;
                continue;
            }

            // Acquire before spawning so at most `concurrency` tasks exist at once.
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let artifacts = Arc::clone(&self.artifacts);
            let deadline = self.attempt_timeout;
            tasks.spawn(async move {
                let _permit = permit;
                match artifacts.generate_within(&order.order_id, deadline).await {
                    Ok(_) => Outcome::Generated,
                    Err(BookingError::GenerationInProgress(_)) => Outcome::InFlight,
                    Err(BookingError::NotEligible { status, .. }) => {
                        debug!(order_id = %order.order_id, %status, "Order left the successful state before generation");
                        Outcome::NotEligible
                    }
                    Err(e) => {
                        warn!(order_id = %order.order_id, error = %e, "Reconciliation attempt failed");
                        Outcome::Failed
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Generated) => report.generated += 1,
                Ok(Outcome::InFlight) => report.skipped_in_flight += 1,
                Ok(Outcome::NotEligible) => report.no_longer_eligible += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Reconciliation task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            generated = report.generated,
            skipped = report.skipped_in_flight,
            failed = report.failed,
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` flips to `true` or its sender is
    /// dropped. The first sweep runs immediately.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.concurrency,
            interval_secs = interval.as_secs(),
            "Reconciliation job started"
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reconciliation job stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_missing_artifacts().await {
                        error!(error = %e, "Failed to list orders for reconciliation");
                    }
                }
            }
        }
    }
}
