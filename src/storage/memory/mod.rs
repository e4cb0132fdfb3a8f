//! In-memory document store.
//!
//! `MemoryCluster` plays the role of a cluster of named buckets and is the
//! `StoreConnector` for standalone use and tests. `MemoryStore` is one bucket
//! (optionally one collection within it). With the `test-utils` feature both
//! expose failure injection so error paths can be exercised.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::{
    Cas, DocumentStore, Endpoint, StoreConnector, StoreError, StoreResult, StoredDocument,
};
use crate::storage::query::{compare, DeleteQuery, Order, SelectQuery};
#[cfg(any(test, feature = "test-utils"))]
use crate::storage::schema::fields;

type BucketKey = (String, Option<String>);

/// A set of named in-memory buckets.
#[derive(Default)]
pub struct MemoryCluster {
    stores: RwLock<HashMap<BucketKey, Arc<MemoryStore>>>,
    /// When non-empty, only these buckets exist.
    known_buckets: HashSet<String>,
    connection_failures: AtomicU32,
    connect_attempts: AtomicU32,
}

impl MemoryCluster {
    /// A cluster that creates buckets on first connect.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster with a fixed set of buckets. Connecting elsewhere fails.
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_buckets: buckets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Make the next `count` connection attempts fail with a transient error.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fail_next_connections(&self, count: u32) {
        self.connection_failures.store(count, AtomicOrdering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(AtomicOrdering::SeqCst)
    }

    /// The store behind a bucket/collection, if it has been opened.
    pub async fn store(&self, bucket: &str, collection: Option<&str>) -> Option<Arc<MemoryStore>> {
        let key = (bucket.to_string(), collection.map(str::to_string));
        self.stores.read().await.get(&key).cloned()
    }

    async fn open(&self, bucket: &str, collection: Option<&str>) -> StoreResult<Arc<MemoryStore>> {
        if !self.known_buckets.is_empty() && !self.known_buckets.contains(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        let key = (bucket.to_string(), collection.map(str::to_string));
        let mut stores = self.stores.write().await;
        let store = stores
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryStore::new(bucket)));
        Ok(Arc::clone(store))
    }
}

#[async_trait]
impl StoreConnector for MemoryCluster {
    async fn connect(&self, endpoint: &Endpoint) -> StoreResult<Arc<dyn DocumentStore>> {
        self.connect_attempts.fetch_add(1, AtomicOrdering::SeqCst);

        let injected = self
            .connection_failures
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StoreError::Connection(format!(
                "injected failure connecting to {}",
                endpoint.connection_string
            )));
        }

        let store = self
            .open(&endpoint.bucket, endpoint.collection.as_deref())
            .await?;
        debug!(
            bucket = %endpoint.bucket,
            collection = ?endpoint.collection,
            "Opened in-memory bucket"
        );
        Ok(store as Arc<dyn DocumentStore>)
    }
}

/// One in-memory bucket.
pub struct MemoryStore {
    bucket: String,
    documents: RwLock<BTreeMap<String, StoredDocument>>,
    next_cas: AtomicU64,
    queries_issued: AtomicUsize,
    #[cfg(any(test, feature = "test-utils"))]
    faults: Faults,
}

/// Injected failures, checked before each write or query.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
struct Faults {
    fail_on_upsert: RwLock<bool>,
    fail_upserts_for: RwLock<HashSet<String>>,
    fail_on_query: RwLock<bool>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            documents: RwLock::new(BTreeMap::new()),
            next_cas: AtomicU64::new(1),
            queries_issued: AtomicUsize::new(0),
            #[cfg(any(test, feature = "test-utils"))]
            faults: Faults::default(),
        }
    }

    /// Fail every upsert/insert/replace.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn set_fail_on_upsert(&self, fail: bool) {
        *self.faults.fail_on_upsert.write().await = fail;
    }

    /// Fail upserts of documents whose `persistenceId` equals `persistence_id`.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn fail_upserts_for(&self, persistence_id: impl Into<String>) {
        self.faults
            .fail_upserts_for
            .write()
            .await
            .insert(persistence_id.into());
    }

    /// Fail every select and delete query.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn set_fail_on_query(&self, fail: bool) {
        *self.faults.fail_on_query.write().await = fail;
    }

    /// Number of select and delete queries issued so far.
    pub fn queries_issued(&self) -> usize {
        self.queries_issued.load(AtomicOrdering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn next_cas(&self) -> Cas {
        Cas(self.next_cas.fetch_add(1, AtomicOrdering::SeqCst))
    }

    #[cfg(not(any(test, feature = "test-utils")))]
    async fn check_writable(&self, _key: &str, _document: &Value) -> StoreResult<()> {
        Ok(())
    }

    #[cfg(any(test, feature = "test-utils"))]
    async fn check_writable(&self, key: &str, document: &Value) -> StoreResult<()> {
        if *self.faults.fail_on_upsert.read().await {
            return Err(StoreError::Unavailable(format!("injected write failure for '{key}'")));
        }
        let failing = self.faults.fail_upserts_for.read().await;
        if let Some(id) = document.get(fields::PERSISTENCE_ID).and_then(Value::as_str) {
            if failing.contains(id) {
                return Err(StoreError::Unavailable(format!(
                    "injected write failure for persistence id '{id}'"
                )));
            }
        }
        Ok(())
    }

    async fn check_queryable(&self) -> StoreResult<()> {
        self.queries_issued.fetch_add(1, AtomicOrdering::SeqCst);
        #[cfg(any(test, feature = "test-utils"))]
        if *self.faults.fail_on_query.read().await {
            return Err(StoreError::Query("injected query failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upsert(&self, key: &str, document: Value) -> StoreResult<Cas> {
        self.check_writable(key, &document).await?;
        let cas = self.next_cas();
        self.documents.write().await.insert(
            key.to_string(),
            StoredDocument {
                content: document,
                cas,
            },
        );
        Ok(cas)
    }

    async fn insert(&self, key: &str, document: Value) -> StoreResult<Cas> {
        self.check_writable(key, &document).await?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        let cas = self.next_cas();
        documents.insert(
            key.to_string(),
            StoredDocument {
                content: document,
                cas,
            },
        );
        Ok(cas)
    }

    async fn replace(&self, key: &str, document: Value, cas: Cas) -> StoreResult<Cas> {
        self.check_writable(key, &document).await?;
        let mut documents = self.documents.write().await;
        match documents.get_mut(key) {
            Some(existing) if existing.cas == cas => {
                let cas = self.next_cas();
                *existing = StoredDocument {
                    content: document,
                    cas,
                };
                Ok(cas)
            }
            _ => Err(StoreError::CasMismatch {
                key: key.to_string(),
            }),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.documents.write().await.remove(key).is_some())
    }

    async fn query(&self, query: &SelectQuery) -> StoreResult<Vec<Value>> {
        self.check_queryable().await?;
        let documents = self.documents.read().await;
        let mut rows: Vec<Value> = documents
            .values()
            .filter(|doc| query.filter.matches(&doc.content))
            .map(|doc| doc.content.clone())
            .collect();
        drop(documents);

        if let Some((field, order)) = query.order_by {
            rows.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(std::cmp::Ordering::Equal),
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                match order {
                    Order::Asc => ordering,
                    Order::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn delete_where(&self, query: &DeleteQuery) -> StoreResult<u64> {
        self.check_queryable().await?;
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, doc| !query.filter.matches(&doc.content));
        Ok((before - documents.len()) as u64)
    }
}
