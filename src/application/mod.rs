//! Application layer orchestrating the booking flow.
//!
//! Services here own no storage. They talk to the outside world through the
//! ports in [`crate::domain::ports`] and bound every external call with a
//! deadline.

pub mod artifacts;
pub mod lifecycle;
pub mod reconciliation;

use crate::config::ServiceConfig;
use crate::domain::ports::{CatalogRef, ClockRef, OrderStoreRef, PaymentGatewayRef};
use crate::error::{BookingError, Result};
use artifacts::ArtifactService;
use lifecycle::OrderLifecycleService;
use reconciliation::ReconciliationJob;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Awaits `fut` for at most `duration`. An elapsed deadline drops the future and
/// surfaces as [`BookingError::Timeout`].
pub(crate) async fn with_deadline<T>(
    operation: &'static str,
    duration: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(BookingError::Timeout { operation }),
    }
}

/// The three services wired against one set of adapters.
pub struct BookingServices {
    pub lifecycle: OrderLifecycleService,
    pub artifacts: Arc<ArtifactService>,
    pub reconciliation: ReconciliationJob,
}

impl BookingServices {
    pub fn new(
        store: OrderStoreRef,
        gateway: PaymentGatewayRef,
        catalog: CatalogRef,
        clock: ClockRef,
        config: &ServiceConfig,
    ) -> Self {
        let artifacts = Arc::new(ArtifactService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config,
        ));
        let lifecycle = OrderLifecycleService::new(
            Arc::clone(&store),
            gateway,
            catalog,
            Arc::clone(&artifacts),
            clock,
            config,
        );
        let reconciliation = ReconciliationJob::new(store, Arc::clone(&artifacts), config);
        Self {
            lifecycle,
            artifacts,
            reconciliation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let ok = with_deadline("noop", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<()> = with_deadline("noop", Duration::from_secs(1), async {
            Err(BookingError::ValidationError("bad".into()))
        })
        .await;
        assert!(matches!(err, Err(BookingError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result: Result<()> = with_deadline("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(BookingError::Timeout {
                operation: "slow call"
            })
        ));
    }
}
