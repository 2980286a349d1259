#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workshop_pass::application::BookingServices;
use workshop_pass::config::ServiceConfig;
use workshop_pass::domain::money::{Amount, Currency};
use workshop_pass::domain::order::{Order, OrderId, UserId, WorkshopRef};
use workshop_pass::domain::payment::{CatalogItem, UserContact};
use workshop_pass::domain::ports::OrderStore;
use workshop_pass::error::Result;
use workshop_pass::infrastructure::gateway::SimulatedGateway;
use workshop_pass::infrastructure::in_memory::{InMemoryCatalog, InMemoryOrderStore};

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *self.0.lock().expect("clock mutex") += delta;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }
}

/// Store whose reads and writes each take `delay`, so concurrent callers overlap.
#[derive(Clone)]
pub struct SlowStore {
    pub inner: InMemoryOrderStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: InMemoryOrderStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl OrderStore for SlowStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(order_id).await
    }

    async fn compare_and_swap(&self, order: Order, expected_version: u64) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.compare_and_swap(order, expected_version).await
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        self.inner.orders_for_user(user_id).await
    }

    async fn orders_missing_artifact(&self) -> Result<Vec<Order>> {
        self.inner.orders_missing_artifact().await
    }
}

pub fn workshop(reference: &str, price: Decimal) -> CatalogItem {
    CatalogItem {
        reference: WorkshopRef::from(reference),
        title: format!("Workshop {}", reference),
        price: Amount::new(price).unwrap(),
        currency: Currency::new("INR").unwrap(),
        bookable: true,
    }
}

pub fn contact() -> UserContact {
    UserContact::new("Asha", Some("asha@example.com".to_string()), None).unwrap()
}

pub async fn services_with(
    store: Arc<dyn OrderStore>,
    clock: Arc<MutableClock>,
    config: ServiceConfig,
) -> BookingServices {
    let catalog = InMemoryCatalog::new();
    catalog.upsert(workshop("W1", Decimal::from(500))).await;
    BookingServices::new(
        store,
        Arc::new(SimulatedGateway::new("https://pay.test")),
        Arc::new(catalog),
        clock,
        &config,
    )
}

/// Polls until the stored order carries an artifact.
pub async fn wait_for_artifact(store: &dyn OrderStore, order_id: &OrderId) -> Order {
    for _ in 0..200 {
        let order = store.get(order_id).await.unwrap().unwrap();
        if order.has_artifact() {
            return order;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("artifact for {order_id} was never issued");
}

pub fn write_lines(path: &Path, lines: &[&str]) -> std::result::Result<(), Error> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

pub const CATALOG: &[&str] = &[
    "reference,title,price,currency,bookable",
    "W1,Pottery basics,500,INR,true",
    "W2,Night sky photography,1200,INR,false",
];
