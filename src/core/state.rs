//! Persisted product state and the shared, mutex-guarded state document.
//!
//! The document is split into two independently locked halves so the normal
//! and discovery groups never serialize behind each other. Whenever both are
//! needed the normal half is locked first.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::core::product::{AvailableSize, SkuQuery};
use crate::core::MonitorError;

/// Last-known state of one monitored SKU.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProductState {
    /// Normalized SKU.
    pub sku: String,
    /// Whether the product was purchasable at last observation.
    #[serde(default)]
    pub available_for_sale: bool,
    /// Sizes in stock at last observation.
    #[serde(default)]
    pub available_sizes: Vec<AvailableSize>,
    /// Raw price string at last observation.
    #[serde(default)]
    pub price: String,
}

impl PersistedProductState {
    /// The record written when a SKU is considered delisted.
    pub fn unloaded(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            available_for_sale: false,
            available_sizes: Vec::new(),
            price: "0".into(),
        }
    }
}

/// Ledger entry for a product that already triggered a discovery alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedProductState {
    /// Normalized SKU.
    pub sku: String,
    /// Raw keyword queries that matched when the alert was sent.
    #[serde(default)]
    pub matching_keyword_queries: Vec<String>,
}

/// Normal-group half of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalStates {
    /// Monitored SKUs in the order they were added.
    #[serde(default)]
    pub sku_queries: Vec<String>,
    /// Last-known state, one entry per observed SKU.
    #[serde(default)]
    pub product_states: Vec<PersistedProductState>,
}

impl NormalStates {
    /// Find the state for a SKU.
    #[must_use]
    pub fn get(&self, sku: &SkuQuery) -> Option<&PersistedProductState> {
        self.product_states.iter().find(|s| s.sku == sku.as_str())
    }

    /// Find the state for a SKU, mutably.
    pub fn get_mut(&mut self, sku: &SkuQuery) -> Option<&mut PersistedProductState> {
        self.product_states.iter_mut().find(|s| s.sku == sku.as_str())
    }

    /// Insert or replace the state for its SKU.
    pub fn upsert(&mut self, state: PersistedProductState) {
        match self.product_states.iter_mut().find(|s| s.sku == state.sku) {
            Some(existing) => *existing = state,
            None => self.product_states.push(state),
        }
    }

    /// Whether a SKU is monitored.
    #[must_use]
    pub fn contains(&self, sku: &SkuQuery) -> bool {
        self.is_listed(sku) || self.get(sku).is_some()
    }

    /// Whether a SKU is in the explicit monitoring list. Only listed SKUs may
    /// gain a state record.
    #[must_use]
    pub fn is_listed(&self, sku: &SkuQuery) -> bool {
        self.sku_queries.iter().any(|q| q == sku.as_str())
    }

    /// List every SKU that only has a state record, as older documents
    /// stored them. Returns whether the list grew.
    pub fn adopt_unlisted(&mut self) -> bool {
        let before = self.sku_queries.len();
        for state in &self.product_states {
            if !self.sku_queries.iter().any(|q| *q == state.sku) {
                self.sku_queries.push(state.sku.clone());
            }
        }
        self.sku_queries.len() != before
    }

    /// Start monitoring a SKU. Its state record is created on first
    /// observation.
    ///
    /// # Errors
    ///
    /// `AlreadyIncluded` if the SKU is already monitored.
    pub fn add_sku(&mut self, sku: &SkuQuery) -> Result<(), MonitorError> {
        if self.contains(sku) {
            return Err(MonitorError::AlreadyIncluded {
                states: "normal".into(),
                kind: "sku".into(),
                value: sku.to_string(),
            });
        }
        self.sku_queries.push(sku.to_string());
        Ok(())
    }

    /// Stop monitoring a SKU and drop its state record.
    ///
    /// # Errors
    ///
    /// `NotIncluded` if the SKU is not monitored.
    pub fn remove_sku(&mut self, sku: &SkuQuery) -> Result<(), MonitorError> {
        if !self.contains(sku) {
            return Err(MonitorError::NotIncluded {
                states: "normal".into(),
                kind: "sku".into(),
                value: sku.to_string(),
            });
        }
        self.sku_queries.retain(|q| q != sku.as_str());
        self.product_states.retain(|s| s.sku != sku.as_str());
        Ok(())
    }

    /// All monitored SKUs: listed queries first, then any SKU that only has a
    /// state record.
    #[must_use]
    pub fn skus(&self) -> Vec<SkuQuery> {
        let mut skus: Vec<SkuQuery> = self.sku_queries.iter().map(SkuQuery::new).collect();
        for state in &self.product_states {
            let sku = SkuQuery::new(&state.sku);
            if !skus.contains(&sku) {
                skus.push(sku);
            }
        }
        skus
    }
}

/// Discovery-group half of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStates {
    /// SKUs that already triggered a discovery alert.
    #[serde(default)]
    pub notified_products: Vec<NotifiedProductState>,
    /// Newest listing pid seen so far.
    #[serde(default)]
    pub last_known_pid: String,
    /// Raw keyword queries being monitored.
    #[serde(default)]
    pub keyword_queries: Vec<String>,
}

impl DiscoveryStates {
    /// Whether a SKU already triggered an alert.
    #[must_use]
    pub fn is_notified(&self, sku: &SkuQuery) -> bool {
        self.notified_products.iter().any(|n| n.sku == sku.as_str())
    }

    /// Record an alerted SKU; returns whether the ledger changed.
    pub fn record_notified(&mut self, sku: &SkuQuery, matching: Vec<String>) -> bool {
        match self
            .notified_products
            .iter_mut()
            .find(|n| n.sku == sku.as_str())
        {
            Some(entry) if entry.matching_keyword_queries == matching => false,
            Some(entry) => {
                entry.matching_keyword_queries = matching;
                true
            }
            None => {
                self.notified_products.push(NotifiedProductState {
                    sku: sku.to_string(),
                    matching_keyword_queries: matching,
                });
                true
            }
        }
    }

    /// Add a raw keyword query.
    ///
    /// # Errors
    ///
    /// `AlreadyIncluded` if the query is already present.
    pub fn add_keyword(&mut self, raw: &str) -> Result<(), MonitorError> {
        if self.keyword_queries.iter().any(|k| k == raw) {
            return Err(MonitorError::AlreadyIncluded {
                states: "discovery".into(),
                kind: "keyword".into(),
                value: raw.into(),
            });
        }
        self.keyword_queries.push(raw.into());
        Ok(())
    }

    /// Remove a raw keyword query.
    ///
    /// # Errors
    ///
    /// `NotIncluded` if the query is absent.
    pub fn remove_keyword(&mut self, raw: &str) -> Result<(), MonitorError> {
        let before = self.keyword_queries.len();
        self.keyword_queries.retain(|k| k != raw);
        if self.keyword_queries.len() == before {
            return Err(MonitorError::NotIncluded {
                states: "discovery".into(),
                kind: "keyword".into(),
                value: raw.into(),
            });
        }
        Ok(())
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductStates {
    /// Normal-group state.
    #[serde(default)]
    pub normal: NormalStates,
    /// Discovery-group state. Stored under `load` for compatibility with
    /// existing state files.
    #[serde(default, rename = "load", alias = "discovery")]
    pub discovery: DiscoveryStates,
}

/// Shared handle to the document halves, each behind its own mutex.
#[derive(Debug, Clone, Default)]
pub struct SharedStates {
    normal: Arc<Mutex<NormalStates>>,
    discovery: Arc<Mutex<DiscoveryStates>>,
}

impl SharedStates {
    /// Split a loaded document into independently locked halves.
    #[must_use]
    pub fn new(states: ProductStates) -> Self {
        Self {
            normal: Arc::new(Mutex::new(states.normal)),
            discovery: Arc::new(Mutex::new(states.discovery)),
        }
    }

    /// Lock the normal half.
    pub fn normal(&self) -> MutexGuard<'_, NormalStates> {
        self.normal.lock()
    }

    /// Lock the discovery half.
    pub fn discovery(&self) -> MutexGuard<'_, DiscoveryStates> {
        self.discovery.lock()
    }

    /// Copy the full document, taking the locks in order.
    #[must_use]
    pub fn snapshot(&self) -> ProductStates {
        let normal = self.normal.lock();
        let discovery = self.discovery.lock();
        ProductStates {
            normal: normal.clone(),
            discovery: discovery.clone(),
        }
    }
}
