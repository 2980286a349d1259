use super::order::{Order, OrderId, UserId, WorkshopRef};
use super::payment::{CatalogItem, PaymentLink, PaymentLinkRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable record of orders, one document per `order_id`.
///
/// Every write is atomic for a single order. Updates are optimistic: the caller
/// passes the version it read, and the store refuses the write with
/// `ConcurrentModification` if another writer got there first.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a brand-new order. Fails with `IdentifierCollision` if the id is
    /// already taken.
    async fn insert(&self, order: Order) -> Result<()>;

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Replaces the stored order if its version still equals `expected_version`.
    async fn compare_and_swap(&self, order: Order, expected_version: u64) -> Result<()>;

    /// All orders placed by `user_id`, newest first.
    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// Successful orders that have no verification artifact yet.
    async fn orders_missing_artifact(&self) -> Result<Vec<Order>>;
}

/// Contract to the external payment-link provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink>;
}

/// Lookup into the workshop discovery catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Ok(None)` when the reference is unknown.
    async fn resolve_bookable_item(&self, reference: &WorkshopRef) -> Result<Option<CatalogItem>>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type CatalogRef = Arc<dyn Catalog>;
pub type ClockRef = Arc<dyn mockable::Clock>;

/// Orders newest first; equal timestamps fall back to id so output is stable.
pub(crate) fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.order_id.cmp(&a.order_id))
    });
}
