//! Shared fixtures: a seeded memory store and `Store` wrappers that record,
//! fail or stall calls.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use dynoscan::types::{AttributeMap, Key, KeyType, TableDescription, TableSchema};
use dynoscan::{
    Config, MemoryStore, PartialScan, ScanPage, Store, StoreError, TableClient,
};

pub const TABLE: &str = "items";

pub fn attrs(value: serde_json::Value) -> AttributeMap {
    value.as_object().cloned().unwrap()
}

pub fn item_id(i: usize) -> String {
    format!("item_{i:04}")
}

/// Route scan logs to the test harness; `RUST_LOG=dynoscan=debug` shows pages.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A memory store with table `items` (hash key `id`) holding `n` items.
pub async fn seeded_store(n: usize, page_size: usize) -> Arc<MemoryStore> {
    seeded_table(TABLE, n, page_size).await
}

/// Like [`seeded_store`], with the table named `table`.
pub async fn seeded_table(table: &str, n: usize, page_size: usize) -> Arc<MemoryStore> {
    init_tracing();
    let store = MemoryStore::with_page_size(page_size);
    store
        .create_table(table)
        .partition_key("id", KeyType::String)
        .execute()
        .unwrap();
    let schema = store
        .describe_table(table)
        .await
        .unwrap()
        .primary_key()
        .unwrap();
    for i in 0..n {
        store
            .put_item(&schema, &Key::hash(item_id(i)), attrs(json!({"n": i})))
            .await
            .unwrap();
    }
    Arc::new(store)
}

pub fn client(store: Arc<dyn Store>) -> TableClient {
    let config = Config::builder("http://localhost:8000").build().unwrap();
    TableClient::new(config, store)
}

fn segment_of(request: &PartialScan) -> usize {
    request.segment
}

/// Records every partial scan request and tracks calls in flight.
pub struct RecordingStore {
    inner: Arc<dyn Store>,
    pub requests: Mutex<Vec<PartialScan>>,
    pub in_flight: AtomicUsize,
    pub consistent_reads: Mutex<Vec<bool>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            consistent_reads: Mutex::new(Vec::new()),
        }
    }

    pub fn segments_seen(&self) -> HashSet<usize> {
        self.requests.lock().iter().map(segment_of).collect()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.inner.describe_table(table).await
    }

    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError> {
        let _guard = InFlight::enter(&self.in_flight);
        self.requests.lock().push(request.clone());
        tokio::task::yield_now().await;
        self.inner.partial_scan(table, request).await
    }

    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError> {
        self.inner.put_item(table, key, attributes).await
    }

    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        consistent: bool,
    ) -> Result<AttributeMap, StoreError> {
        self.consistent_reads.lock().push(consistent);
        self.inner.get_item(table, key, consistent).await
    }
}

/// Fails the first `failures` partial scans of each listed segment.
pub struct FaultyStore {
    inner: Arc<dyn Store>,
    failing: Vec<usize>,
    remaining: Mutex<Vec<usize>>,
    pub failed: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn Store>, failing: Vec<usize>, failures: usize) -> Self {
        let remaining = vec![failures; failing.len()];
        Self {
            inner,
            failing,
            remaining: Mutex::new(remaining),
            failed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.inner.describe_table(table).await
    }

    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError> {
        let should_fail = match self.failing.iter().position(|&s| s == request.segment) {
            Some(idx) => {
                let mut remaining = self.remaining.lock();
                if remaining[idx] > 0 {
                    remaining[idx] -= 1;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if should_fail {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Throttled);
        }
        self.inner.partial_scan(table, request).await
    }

    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError> {
        self.inner.put_item(table, key, attributes).await
    }

    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        consistent: bool,
    ) -> Result<AttributeMap, StoreError> {
        self.inner.get_item(table, key, consistent).await
    }
}

/// Serves the first page of each segment, then never answers again.
///
/// `abandoned` counts stalled calls whose futures were dropped.
pub struct StallingStore {
    inner: Arc<dyn Store>,
    served: Mutex<HashSet<usize>>,
    pub stalled: AtomicUsize,
    pub abandoned: Arc<AtomicUsize>,
}

impl StallingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            served: Mutex::new(HashSet::new()),
            stalled: AtomicUsize::new(0),
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct Abandoned(Arc<AtomicUsize>);

impl Drop for Abandoned {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for StallingStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.inner.describe_table(table).await
    }

    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError> {
        let first = self.served.lock().insert(request.segment);
        if first {
            return self.inner.partial_scan(table, request).await;
        }
        self.stalled.fetch_add(1, Ordering::SeqCst);
        let _abandoned = Abandoned(Arc::clone(&self.abandoned));
        std::future::pending::<()>().await;
        unreachable!("pending future resolved")
    }

    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError> {
        self.inner.put_item(table, key, attributes).await
    }

    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        consistent: bool,
    ) -> Result<AttributeMap, StoreError> {
        self.inner.get_item(table, key, consistent).await
    }
}

/// Panics inside `partial_scan` for one segment.
pub struct PanickingStore {
    inner: Arc<dyn Store>,
    segment: usize,
}

impl PanickingStore {
    pub fn new(inner: Arc<dyn Store>, segment: usize) -> Self {
        Self { inner, segment }
    }
}

#[async_trait]
impl Store for PanickingStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        self.inner.describe_table(table).await
    }

    async fn partial_scan(
        &self,
        table: &TableSchema,
        request: PartialScan,
    ) -> Result<ScanPage, StoreError> {
        if request.segment == self.segment {
            panic!("store blew up on segment {}", request.segment);
        }
        self.inner.partial_scan(table, request).await
    }

    async fn put_item(
        &self,
        table: &TableSchema,
        key: &Key,
        attributes: AttributeMap,
    ) -> Result<(), StoreError> {
        self.inner.put_item(table, key, attributes).await
    }

    async fn get_item(
        &self,
        table: &TableSchema,
        key: &Key,
        consistent: bool,
    ) -> Result<AttributeMap, StoreError> {
        self.inner.get_item(table, key, consistent).await
    }
}
