use super::with_deadline;
use crate::config::ServiceConfig;
use crate::domain::artifact::{ArtifactPayload, ArtifactToken};
use crate::domain::order::OrderId;
use crate::domain::ports::{ClockRef, OrderStoreRef};
use crate::domain::status::OrderStatus;
use crate::error::{BookingError, Result};
use chrono::TimeDelta;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Keyed record of orders whose artifact is being generated right now.
///
/// Claims are per order, so generation for different orders never contends.
#[derive(Default, Clone)]
pub struct GenerationGuard {
    in_flight: Arc<DashSet<OrderId>>,
}

impl GenerationGuard {
    /// Claims `order_id`, or returns `None` if another attempt holds it.
    pub fn try_claim(&self, order_id: &OrderId) -> Option<InFlight> {
        if self.in_flight.insert(order_id.clone()) {
            Some(InFlight {
                in_flight: Arc::clone(&self.in_flight),
                order_id: order_id.clone(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.in_flight.contains(order_id)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Held for the duration of one generation attempt. Dropping it, on any exit
/// path including cancellation, releases the claim.
pub struct InFlight {
    in_flight: Arc<DashSet<OrderId>>,
    order_id: OrderId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.in_flight.remove(&self.order_id);
    }
}

/// Builds, persists and validates verification artifacts.
///
/// At most one generation attempt per order is in flight at any time; a second
/// request for the same order fails fast with `GenerationInProgress` instead of
/// queueing behind the first.
pub struct ArtifactService {
    store: OrderStoreRef,
    clock: ClockRef,
    ttl: Option<TimeDelta>,
    call_timeout: Duration,
    generation_timeout: Duration,
    guard: GenerationGuard,
}

impl ArtifactService {
    pub fn new(store: OrderStoreRef, clock: ClockRef, config: &ServiceConfig) -> Self {
        Self {
            store,
            clock,
            ttl: config.artifact_ttl,
            call_timeout: config.call_timeout,
            generation_timeout: config.generation_timeout,
            guard: GenerationGuard::default(),
        }
    }

    /// Generates a fresh artifact for a successful order and stores it on the
    /// order, replacing any previous one.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn generate_order_artifact(&self, order_id: &OrderId) -> Result<ArtifactToken> {
        let Some(_claim) = self.guard.try_claim(order_id) else {
            debug!("Generation already in flight");
            return Err(BookingError::GenerationInProgress(order_id.clone()));
        };

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let order = with_deadline(
                "order lookup",
                self.call_timeout,
                self.store.get(order_id),
            )
            .await?
            .ok_or_else(|| BookingError::not_found("order", order_id))?;

            if order.status != OrderStatus::Successful {
                return Err(BookingError::NotEligible {
                    order_id: order.order_id,
                    status: order.status,
                });
            }

            let now = self.clock.utc();
            let token = ArtifactPayload::for_order(&order, now, self.ttl).encode()?;
            let updated = order.with_artifact(token.clone(), now);

            match with_deadline(
                "artifact write",
                self.call_timeout,
                self.store.compare_and_swap(updated, order.version),
            )
            .await
            {
                Ok(()) => {
                    info!(expires_in_days = ?self.ttl.map(|t| t.num_days()), "Verification artifact issued");
                    return Ok(token);
                }
                Err(BookingError::ConcurrentModification(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, "Order changed underneath generation, re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(BookingError::ConcurrentModification(order_id.clone()))
    }

    /// Same as [`Self::generate_order_artifact`] but bounded by `deadline`. The
    /// claim is released when the deadline cancels the attempt.
    pub async fn generate_within(
        &self,
        order_id: &OrderId,
        deadline: Duration,
    ) -> Result<ArtifactToken> {
        with_deadline(
            "artifact generation",
            deadline,
            self.generate_order_artifact(order_id),
        )
        .await
    }

    /// Runs generation on a detached task. `GenerationInProgress` is expected
    /// under concurrent triggers and only logged at debug level.
    pub fn spawn_generation(self: &Arc<Self>, order_id: OrderId) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            match service
                .generate_within(&order_id, service.generation_timeout)
                .await
            {
                Ok(_) => {}
                Err(BookingError::GenerationInProgress(_)) => {
                    debug!(order_id = %order_id, "Background generation skipped; already in flight");
                }
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Background artifact generation failed; reconciliation will retry");
                }
            }
        })
    }

    /// Decodes a token and checks its expiry. Does not consult the order store.
    pub fn validate_artifact(&self, token: &ArtifactToken) -> Result<ArtifactPayload> {
        let payload = token.decode()?;
        payload.ensure_unexpired(self.clock.utc())?;
        Ok(payload)
    }

    /// Validates the token, then checks it against the live order: the order
    /// must still be successful and must still carry this exact token.
    #[instrument(skip_all)]
    pub async fn verify_artifact(&self, token: &ArtifactToken) -> Result<ArtifactPayload> {
        let payload = self.validate_artifact(token)?;
        let order = with_deadline(
            "order lookup",
            self.call_timeout,
            self.store.get(&payload.order_id),
        )
        .await?
        .ok_or_else(|| BookingError::not_found("order", &payload.order_id))?;

        if order.status != OrderStatus::Successful {
            return Err(BookingError::ArtifactRevoked {
                order_id: order.order_id,
                reason: format!("order is now {}", order.status),
            });
        }
        if order.verification_artifact.as_ref() != Some(token) {
            return Err(BookingError::ArtifactRevoked {
                order_id: order.order_id,
                reason: "superseded by a newer artifact".to_string(),
            });
        }
        Ok(payload)
    }

    pub fn is_generation_in_progress(&self, order_id: &OrderId) -> bool {
        self.guard.contains(order_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.guard.len()
    }

    /// The guard shared by every generation path of this service.
    pub fn guard(&self) -> &GenerationGuard {
        &self.guard
    }
}
