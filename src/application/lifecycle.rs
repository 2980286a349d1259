use super::artifacts::ArtifactService;
use super::with_deadline;
use crate::config::ServiceConfig;
use crate::domain::order::{IdempotencyKey, NewOrder, Order, OrderId, UserId, WorkshopRef};
use crate::domain::payment::{PaymentLink, PaymentLinkRequest, UserContact};
use crate::domain::ports::{CatalogRef, ClockRef, OrderStoreRef, PaymentGatewayRef};
use crate::domain::status::OrderStatus;
use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Inbound payment notification, already authenticated upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub order_id: OrderId,
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Creates orders, applies gateway notifications and serves order queries.
///
/// Owns no state of its own: orders live in the store, the in-flight generation
/// guard lives in the [`ArtifactService`].
pub struct OrderLifecycleService {
    store: OrderStoreRef,
    gateway: PaymentGatewayRef,
    catalog: CatalogRef,
    artifacts: Arc<ArtifactService>,
    clock: ClockRef,
    call_timeout: Duration,
}

impl OrderLifecycleService {
    pub fn new(
        store: OrderStoreRef,
        gateway: PaymentGatewayRef,
        catalog: CatalogRef,
        artifacts: Arc<ArtifactService>,
        clock: ClockRef,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            artifacts,
            clock,
            call_timeout: config.call_timeout,
        }
    }

    /// Opens a payment order for a bookable workshop.
    ///
    /// All-or-nothing: the order is persisted only after the gateway has issued a
    /// link, with a single insert, so a failure or cancellation at any earlier
    /// point leaves nothing behind.
    #[instrument(skip(self, contact), fields(workshop = %workshop, user_id = %user_id))]
    pub async fn create_payment_link(
        &self,
        workshop: &WorkshopRef,
        user_id: &UserId,
        contact: UserContact,
    ) -> Result<(Order, PaymentLink)> {
        let item = with_deadline(
            "catalog lookup",
            self.call_timeout,
            self.catalog.resolve_bookable_item(workshop),
        )
        .await?
        .ok_or_else(|| BookingError::not_found("workshop", workshop))?;

        if !item.bookable {
            return Err(BookingError::not_found("bookable workshop", workshop));
        }

        let order_id = OrderId::generate();
        let idempotency_key = IdempotencyKey::generate();

        let request = PaymentLinkRequest {
            order_id: order_id.clone(),
            amount: item.price,
            currency: item.currency.clone(),
            contact,
            idempotency_key: idempotency_key.clone(),
            description: format!("Booking: {}", item.title),
        };
        let payment_link = with_deadline(
            "payment link creation",
            self.call_timeout,
            self.gateway.create_payment_link(request),
        )
        .await?;

        let order = Order::new(
            NewOrder {
                order_id,
                idempotency_key,
                user_id: user_id.clone(),
                workshop: workshop.clone(),
                amount: item.price,
                currency: item.currency,
                payment_link: payment_link.clone(),
            },
            self.clock.utc(),
        );

        let inserted = with_deadline(
            "order insert",
            self.call_timeout,
            self.store.insert(order.clone()),
        )
        .await;
        match inserted {
            Ok(()) => {}
            Err(BookingError::IdentifierCollision(id)) => {
                error!(order_id = %id, "Generated order id collided with an existing order");
                return Err(BookingError::IdentifierCollision(id));
            }
            Err(e) => return Err(e),
        }

        info!(order_id = %order.order_id, amount = %order.amount, currency = %order.currency, "Order created");
        Ok((order, payment_link))
    }

    /// Applies a gateway-reported status to an order.
    ///
    /// Notifications are at-least-once and may arrive out of order; anything the
    /// state machine does not allow from the current status is rejected with
    /// `InvalidTransition` and the order is left as it was. Entering
    /// `Successful` starts artifact generation in the background.
    #[instrument(skip(self, note), fields(order_id = %order_id, reported = %reported))]
    pub async fn process_webhook(
        &self,
        order_id: &OrderId,
        reported: OrderStatus,
        note: Option<String>,
    ) -> Result<Order> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.load(order_id).await?;
            let next = match current.transition(reported, note.clone(), self.clock.utc()) {
                Ok(next) => next,
                Err(e) => {
                    warn!(current = %current.status, "Rejected webhook transition");
                    return Err(e);
                }
            };

            match with_deadline(
                "order update",
                self.call_timeout,
                self.store.compare_and_swap(next.clone(), current.version),
            )
            .await
            {
                Ok(()) => {
                    info!(from = %current.status, to = %next.status, "Order status updated");
                    if next.status.issues_artifact() {
                        self.artifacts.spawn_generation(next.order_id.clone());
                    }
                    return Ok(next);
                }
                Err(BookingError::ConcurrentModification(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, "Lost update race, re-validating against fresh state");
                }
                Err(e) => return Err(e),
            }
        }

        Err(BookingError::ConcurrentModification(order_id.clone()))
    }

    /// Parses the gateway's status word and applies it.
    pub async fn handle_notification(&self, notification: WebhookNotification) -> Result<Order> {
        let reported: OrderStatus = notification.status.parse()?;
        self.process_webhook(&notification.order_id, reported, notification.note)
            .await
    }

    pub async fn get_order_status(&self, order_id: &OrderId) -> Result<Order> {
        self.load(order_id).await
    }

    /// The user's orders, newest first.
    pub async fn get_order_history(&self, user_id: &UserId) -> Result<Vec<Order>> {
        with_deadline(
            "order history",
            self.call_timeout,
            self.store.orders_for_user(user_id),
        )
        .await
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order> {
        with_deadline("order lookup", self.call_timeout, self.store.get(order_id))
            .await?
            .ok_or_else(|| BookingError::not_found("order", order_id))
    }
}
