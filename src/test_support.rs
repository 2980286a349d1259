//! Shared fixtures for unit tests.

use crate::domain::money::{Amount, Currency};
use crate::domain::order::{IdempotencyKey, NewOrder, Order, OrderId, UserId, WorkshopRef};
use crate::domain::payment::{CatalogItem, PaymentLink, UserContact};
use crate::domain::ports::OrderStore;
use crate::domain::status::OrderStatus;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryOrderStore;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }

    pub fn advance(&self, delta: TimeDelta) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

/// Store whose point reads and missing-artifact listing never complete.
/// Writes and per-user history go straight to `inner`.
#[derive(Clone, Default)]
pub struct StalledStore {
    pub inner: InMemoryOrderStore,
}

impl StalledStore {
    async fn stall() {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

#[async_trait]
impl OrderStore for StalledStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Self::stall().await;
        self.inner.get(order_id).await
    }

    async fn compare_and_swap(&self, order: Order, expected_version: u64) -> Result<()> {
        self.inner.compare_and_swap(order, expected_version).await
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        self.inner.orders_for_user(user_id).await
    }

    async fn orders_missing_artifact(&self) -> Result<Vec<Order>> {
        Self::stall().await;
        self.inner.orders_missing_artifact().await
    }
}

/// A freshly created order for `user`, priced at 500 INR.
pub fn order_for(user: &str, at: DateTime<Utc>) -> Order {
    let order_id = OrderId::generate();
    Order::new(
        NewOrder {
            payment_link: PaymentLink::new(format!("https://pay.test/pay/{}", order_id)),
            order_id,
            idempotency_key: IdempotencyKey::generate(),
            user_id: UserId::from(user),
            workshop: WorkshopRef::from("W1"),
            amount: Amount::new(dec!(500)).unwrap(),
            currency: Currency::new("INR").unwrap(),
        },
        at,
    )
}

/// An order that has already been paid, without an artifact.
pub fn paid_order_for(user: &str, at: DateTime<Utc>) -> Order {
    order_for(user, at)
        .transition(OrderStatus::Successful, None, at)
        .unwrap()
}

pub fn workshop_item(reference: &str, price: Decimal, bookable: bool) -> CatalogItem {
    CatalogItem {
        reference: WorkshopRef::from(reference),
        title: format!("Workshop {}", reference),
        price: Amount::new(price).unwrap(),
        currency: Currency::new("INR").unwrap(),
        bookable,
    }
}

pub fn contact() -> UserContact {
    UserContact::new("Asha", Some("asha@example.com".to_string()), None).unwrap()
}
