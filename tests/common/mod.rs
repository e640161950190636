//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use restock_sentinel::core::{
    AvailableSize, LeasedProxy, MonitorContext, MonitorError, PageFetcher, PersistenceDispatcher,
    PoolSettings, ProductSnapshot, ProductStates, ProxyPool, ReferenceRecord, SharedStates,
    SkuQuery,
};
use restock_sentinel::infra::{InMemoryStateStore, RecordingNotifier};

/// Fetcher serving a mutable in-memory catalog.
#[derive(Default)]
pub struct FakeFetcher {
    catalog: Mutex<HashMap<SkuQuery, ProductSnapshot>>,
    arrivals: Mutex<Vec<ReferenceRecord>>,
    failure: Mutex<Option<MonitorError>>,
    requests: Mutex<Vec<Vec<SkuQuery>>>,
    proxies: Mutex<Vec<Option<String>>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace a product.
    pub fn put(&self, product: ProductSnapshot) {
        self.catalog.lock().insert(product.sku_query(), product);
    }

    /// Remove a product so lookups miss it.
    pub fn delist(&self, sku: &str) {
        self.catalog.lock().remove(&SkuQuery::new(sku));
    }

    /// Replace the new-arrivals listing (newest first).
    pub fn set_arrivals(&self, records: Vec<ReferenceRecord>) {
        *self.arrivals.lock() = records;
    }

    /// Make every call fail with `error` until cleared.
    pub fn fail_with(&self, error: Option<MonitorError>) {
        *self.failure.lock() = error;
    }

    /// Batches requested so far.
    pub fn requests(&self) -> Vec<Vec<SkuQuery>> {
        self.requests.lock().clone()
    }

    /// Proxy used per call, `None` for direct egress.
    pub fn proxies_used(&self) -> Vec<Option<String>> {
        self.proxies.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_by_sku(
        &self,
        skus: &[SkuQuery],
        proxy: Option<&LeasedProxy>,
    ) -> Result<Vec<ProductSnapshot>, MonitorError> {
        self.requests.lock().push(skus.to_vec());
        self.proxies.lock().push(proxy.map(ToString::to_string));
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let catalog = self.catalog.lock();
        Ok(skus.iter().filter_map(|s| catalog.get(s).cloned()).collect())
    }

    async fn fetch_new_arrivals(
        &self,
        proxy: Option<&LeasedProxy>,
    ) -> Result<Vec<ReferenceRecord>, MonitorError> {
        self.proxies.lock().push(proxy.map(ToString::to_string));
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(self.arrivals.lock().clone())
    }
}

pub fn snapshot(sku: &str, for_sale: bool, sizes: &[&str], price: &str) -> ProductSnapshot {
    ProductSnapshot {
        sku: sku.into(),
        title: format!("Product {sku}"),
        product_url: format!("https://shop.example/p/{sku}"),
        available_for_sale: for_sale,
        available_sizes: sizes.iter().map(|s| AvailableSize::new(*s, 1)).collect(),
        price: price.into(),
        ..ProductSnapshot::default()
    }
}

pub fn arrival(pid: &str, sku: &str) -> ReferenceRecord {
    ReferenceRecord {
        pid: pid.into(),
        sku: sku.into(),
    }
}

pub fn skus(raw: &[&str]) -> Vec<SkuQuery> {
    raw.iter().map(SkuQuery::new).collect()
}

/// Collaborators wired the way the builder wires them.
pub struct Harness {
    pub ctx: MonitorContext,
    pub fetcher: Arc<FakeFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<InMemoryStateStore>,
}

impl Harness {
    pub fn new(states: ProductStates) -> Self {
        let fetcher = FakeFetcher::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(InMemoryStateStore::with_states(states.clone()));
        let states = SharedStates::new(states);
        let persist =
            Arc::new(PersistenceDispatcher::new(states.clone(), store.clone()).unwrap());
        let pool = Arc::new(ProxyPool::new("", Vec::new(), PoolSettings::default(), None));
        let ctx = MonitorContext {
            states,
            pool,
            fetcher: fetcher.clone(),
            notifier: notifier.clone(),
            persist,
        };
        Self {
            ctx,
            fetcher,
            notifier,
            store,
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
