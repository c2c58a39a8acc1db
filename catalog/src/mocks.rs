//! In-memory repositories for development and testing.
//!
//! They follow the HTTP contract: unknown ids answer 404, a duplicate id on
//! create answers 409, and every stored record is echoed back. An outage can be
//! switched on to make every call fail as a transport error, and a latency can
//! be set to let concurrent requests race.

use crate::error::RepositoryError;
use crate::repository::{CartRepository, ProductRepository, RepositoryFuture, RepositoryResult};
use crate::types::{CartItem, Product, ProductId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Records an in-memory table can hold
pub trait Record: Clone + Send + 'static {
    /// Key of the record
    fn key(&self) -> &ProductId;
}

impl Record for Product {
    fn key(&self) -> &ProductId {
        &self.id
    }
}

impl Record for CartItem {
    fn key(&self) -> &ProductId {
        self.id()
    }
}

#[derive(Debug)]
struct Table<T> {
    records: Mutex<Vec<T>>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

/// Ordered in-memory table standing in for one REST resource
#[derive(Debug)]
pub struct InMemoryTable<T> {
    inner: Arc<Table<T>>,
}

/// In-memory products service
pub type InMemoryProductRepository = InMemoryTable<Product>;

/// In-memory cart service
pub type InMemoryCartRepository = InMemoryTable<CartItem>;

impl<T: Record> InMemoryTable<T> {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Table seeded with `records`
    #[must_use]
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            inner: Arc::new(Table {
                records: Mutex::new(records),
                offline: AtomicBool::new(false),
                latency: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every following call fail as if the service were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every following call
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.inner.latency) = Some(latency);
    }

    /// Snapshot of the stored records
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        lock(&self.inner.records).clone()
    }

    /// Number of calls received so far, failed ones included
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    fn list_records(&self) -> RepositoryFuture<Vec<T>> {
        self.call(|records| Ok(records.clone()))
    }

    fn find_record(&self, id: &ProductId) -> RepositoryFuture<T> {
        let id = id.clone();
        self.call(move |records| {
            records
                .iter()
                .find(|record| *record.key() == id)
                .cloned()
                .ok_or_else(|| not_found(&id))
        })
    }

    fn insert_record(&self, record: T) -> RepositoryFuture<T> {
        self.call(move |records| {
            if records.iter().any(|existing| existing.key() == record.key()) {
                return Err(RepositoryError::Status {
                    status: 409,
                    message: format!("Insert failed, duplicate id {}", record.key()),
                });
            }
            records.push(record.clone());
            Ok(record)
        })
    }

    fn replace_record(&self, id: &ProductId, record: T) -> RepositoryFuture<T> {
        let id = id.clone();
        self.call(move |records| {
            let slot = records
                .iter_mut()
                .find(|existing| *existing.key() == id)
                .ok_or_else(|| not_found(&id))?;
            *slot = record.clone();
            Ok(record)
        })
    }

    fn remove_record(&self, id: &ProductId) -> RepositoryFuture<()> {
        let id = id.clone();
        self.call(move |records| {
            let before = records.len();
            records.retain(|record| *record.key() != id);
            if records.len() == before {
                Err(not_found(&id))
            } else {
                Ok(())
            }
        })
    }

    /// Runs `op` against the records after the configured latency
    fn call<R, F>(&self, op: F) -> RepositoryFuture<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Vec<T>) -> RepositoryResult<R> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        inner.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&inner.latency);

        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if inner.offline.load(Ordering::SeqCst) {
                return Err(RepositoryError::RequestFailed(
                    "connection refused".to_string(),
                ));
            }
            op(&mut lock(&inner.records))
        })
    }
}

impl<T: Record> Default for InMemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryTable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(id: &ProductId) -> RepositoryError {
    RepositoryError::Status {
        status: 404,
        message: format!("{id} not found"),
    }
}

impl ProductRepository for InMemoryProductRepository {
    fn list(&self) -> RepositoryFuture<Vec<Product>> {
        self.list_records()
    }

    fn get(&self, id: &ProductId) -> RepositoryFuture<Product> {
        self.find_record(id)
    }

    fn create(&self, product: Product) -> RepositoryFuture<Product> {
        self.insert_record(product)
    }

    fn update(&self, id: &ProductId, product: Product) -> RepositoryFuture<Product> {
        self.replace_record(id, product)
    }

    fn delete(&self, id: &ProductId) -> RepositoryFuture<()> {
        self.remove_record(id)
    }
}

impl CartRepository for InMemoryCartRepository {
    fn list(&self) -> RepositoryFuture<Vec<CartItem>> {
        self.list_records()
    }

    fn get(&self, id: &ProductId) -> RepositoryFuture<CartItem> {
        self.find_record(id)
    }

    fn create(&self, item: CartItem) -> RepositoryFuture<CartItem> {
        self.insert_record(item)
    }

    fn update(&self, id: &ProductId, item: CartItem) -> RepositoryFuture<CartItem> {
        self.replace_record(id, item)
    }

    fn delete(&self, id: &ProductId) -> RepositoryFuture<()> {
        self.remove_record(id)
    }
}
