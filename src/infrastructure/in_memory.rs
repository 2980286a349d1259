use crate::domain::order::{Order, OrderId, UserId, WorkshopRef};
use crate::domain::payment::CatalogItem;
use crate::domain::ports::{Catalog, OrderStore, sort_newest_first};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Uses `Arc<RwLock<HashMap<OrderId, Order>>>` to allow shared concurrent access.
/// Every write takes the write lock for its whole check-and-set, which gives the
/// single-document atomicity the port requires. Ideal for tests and one-shot
/// replays where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(BookingError::IdentifierCollision(order.order_id));
        }
        orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id).cloned())
    }

    async fn compare_and_swap(&self, order: Order, expected_version: u64) -> Result<()> {
        let mut orders = self.orders.write().await;
        let current = orders
            .get_mut(&order.order_id)
            .ok_or_else(|| BookingError::not_found("order", &order.order_id))?;
        if current.version != expected_version {
            return Err(BookingError::ConcurrentModification(order.order_id));
        }
        *current = order;
        Ok(())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| &order.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        Ok(matching)
    }

    async fn orders_missing_artifact(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|order| order.awaits_artifact())
            .cloned()
            .collect())
    }
}

/// Catalog held in memory, typically loaded from a CSV export.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<WorkshopRef, CatalogItem>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, item: CatalogItem) {
        let mut items = self.items.write().await;
        items.insert(item.reference.clone(), item);
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn resolve_bookable_item(&self, reference: &WorkshopRef) -> Result<Option<CatalogItem>> {
        let items = self.items.read().await;
        Ok(items.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ArtifactToken;
    use crate::domain::status::OrderStatus;
    use crate::test_support::{order_for, paid_order_for};
    use chrono::{TimeDelta, Utc};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = order_for("user-1", Utc::now());

        store.insert(order.clone()).await.unwrap();
        let retrieved = store.get(&order.order_id).await.unwrap().unwrap();
        assert_eq!(retrieved, order);

        assert!(store.get(&OrderId::from("ord_missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_a_collision() {
        let store = InMemoryOrderStore::new();
        let order = order_for("user-1", Utc::now());
        store.insert(order.clone()).await.unwrap();

        let result = store.insert(order).await;
        assert!(matches!(result, Err(BookingError::IdentifierCollision(_))));
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        let order = order_for("user-1", now);
        store.insert(order.clone()).await.unwrap();

        let paid = order.transition(OrderStatus::Successful, None, now).unwrap();
        store.compare_and_swap(paid.clone(), order.version).await.unwrap();

        // A second writer still holding version 1 loses.
        let failed = order.transition(OrderStatus::Failed, None, now).unwrap();
        let result = store.compare_and_swap(failed, order.version).await;
        assert!(matches!(result, Err(BookingError::ConcurrentModification(_))));

        let stored = store.get(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored, paid);
    }

    #[tokio::test]
    async fn test_compare_and_swap_on_unknown_order() {
        let store = InMemoryOrderStore::new();
        let order = order_for("user-1", Utc::now());
        let result = store.compare_and_swap(order, 1).await;
        assert!(matches!(result, Err(BookingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_orders_for_user_newest_first() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        let older = order_for("user-1", now - TimeDelta::minutes(5));
        let newer = order_for("user-1", now);
        let other = order_for("user-2", now);
        for order in [older.clone(), newer.clone(), other] {
            store.insert(order).await.unwrap();
        }

        let history = store.orders_for_user(&UserId::from("user-1")).await.unwrap();
        let ids: Vec<_> = history.iter().map(|o| o.order_id.clone()).collect();
        assert_eq!(ids, vec![newer.order_id, older.order_id]);
    }

    #[tokio::test]
    async fn test_orders_missing_artifact() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        let pending = paid_order_for("user-1", now);
        let done = paid_order_for("user-1", now).with_artifact(ArtifactToken::from("wp1.x"), now);
        let created = order_for("user-1", now);
        for order in [pending.clone(), done, created] {
            store.insert(order).await.unwrap();
        }

        let missing = store.orders_missing_artifact().await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].order_id, pending.order_id);
    }
}
