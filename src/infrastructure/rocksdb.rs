use crate::domain::order::{Order, OrderId, UserId};
use crate::domain::ports::{OrderStore, sort_newest_first};
use crate::error::{BookingError, Result};
use ::rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding one JSON document per order, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family indexing orders by user: `user_id \0 created_at_ms \0 order_id`.
pub const CF_ORDERS_BY_USER: &str = "orders_by_user";
/// Column Family listing successful orders that still lack an artifact.
pub const CF_PENDING_ARTIFACTS: &str = "pending_artifacts";

/// A persistent order store backed by RocksDB.
///
/// Orders and their secondary indexes live in separate Column Families and are
/// always written together in one `WriteBatch`, so an index never disagrees with
/// the document it points at.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`). Writers
/// serialize on `write_lock` so the version check and the batch that follows it
/// behave as one atomic update.
#[derive(Clone)]
pub struct RocksDBOrderStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBOrderStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_ORDERS_BY_USER, CF_PENDING_ARTIFACTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BookingError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_cf(cf, order_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes the document plus both indexes in a single batch.
    fn write(&self, order: &Order) -> Result<()> {
        let orders = self.cf(CF_ORDERS)?;
        let by_user = self.cf(CF_ORDERS_BY_USER)?;
        let pending = self.cf(CF_PENDING_ARTIFACTS)?;

        let key = order.order_id.as_str().as_bytes();
        let mut batch = WriteBatch::default();
        batch.put_cf(orders, key, serde_json::to_vec(order)?);
        batch.put_cf(by_user, user_index_key(order), b"");
        if order.awaits_artifact() {
            batch.put_cf(pending, key, b"");
        } else {
            batch.delete_cf(pending, key);
        }

        self.db.write(batch)?;
        Ok(())
    }
}

fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut prefix = user_id.as_str().as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn user_index_key(order: &Order) -> Vec<u8> {
    let mut key = user_prefix(&order.user_id);
    let millis = order.created_at.timestamp_millis().max(0) as u64;
    key.extend_from_slice(&millis.to_be_bytes());
    key.push(0);
    key.extend_from_slice(order.order_id.as_str().as_bytes());
    key
}

// The order id is whatever follows the last separator.
fn order_id_from_index_key(key: &[u8]) -> Option<OrderId> {
    let start = key.iter().rposition(|b| *b == 0)? + 1;
    std::str::from_utf8(&key[start..]).ok().map(OrderId::from)
}

#[async_trait]
impl OrderStore for RocksDBOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read(&order.order_id)?.is_some() {
            return Err(BookingError::IdentifierCollision(order.order_id));
        }
        self.write(&order)
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.read(order_id)
    }

    async fn compare_and_swap(&self, order: Order, expected_version: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read(&order.order_id)?
            .ok_or_else(|| BookingError::not_found("order", &order.order_id))?;
        if current.version != expected_version {
            return Err(BookingError::ConcurrentModification(order.order_id));
        }
        self.write(&order)
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS_BY_USER)?;
        let prefix = user_prefix(user_id);

        let mut orders = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let Some(order_id) = order_id_from_index_key(&key) else {
                continue;
            };
            if let Some(order) = self.read(&order_id)? {
                orders.push(order);
            }
        }

        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn orders_missing_artifact(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_PENDING_ARTIFACTS)?;

        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            let order_id = OrderId::from(String::from_utf8_lossy(&key).into_owned());
            // Re-check the document; the index is only a hint.
            if let Some(order) = self.read(&order_id)?
                && order.awaits_artifact()
            {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
