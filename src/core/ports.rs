//! Collaborator interfaces the monitor core calls into.
//!
//! Fetching, notification transport and storage formats live outside the
//! core; anything implementing these traits can be plugged in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::product::{AvailableSize, ProductSnapshot, ReferenceRecord, SkuQuery};
use crate::core::proxy_pool::{LeasedProxy, Proxy};
use crate::core::state::ProductStates;
use crate::core::MonitorError;

/// Fetches structured product data from the shop.
///
/// Implementations own request deadlines; a timeout is reported as
/// [`MonitorError::RequestFailed`].
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use restock_sentinel::core::{LeasedProxy, MonitorError, PageFetcher, ProductSnapshot,
///     ReferenceRecord, SkuQuery};
///
/// struct GraphqlFetcher { client: reqwest::Client }
///
/// #[async_trait]
/// impl PageFetcher for GraphqlFetcher {
///     async fn fetch_by_sku(
///         &self,
///         skus: &[SkuQuery],
///         proxy: Option<&LeasedProxy>,
///     ) -> Result<Vec<ProductSnapshot>, MonitorError> {
///         // build the search query, send through `proxy`, map the edges
///         todo!()
///     }
///
///     async fn fetch_new_arrivals(
///         &self,
///         proxy: Option<&LeasedProxy>,
///     ) -> Result<Vec<ReferenceRecord>, MonitorError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    /// Look up products by SKU. SKUs the shop does not return are simply
    /// absent from the result.
    async fn fetch_by_sku(
        &self,
        skus: &[SkuQuery],
        proxy: Option<&LeasedProxy>,
    ) -> Result<Vec<ProductSnapshot>, MonitorError>;

    /// Fetch the new-arrivals listing, newest first.
    async fn fetch_new_arrivals(
        &self,
        proxy: Option<&LeasedProxy>,
    ) -> Result<Vec<ReferenceRecord>, MonitorError>;
}

/// Category of an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A monitored SKU changed in a way worth alerting on.
    Update,
    /// A newly listed product matched a keyword query.
    NewArrival,
}

/// Why a notification was raised. One notification may carry several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotifyReason {
    /// Sizes that were not listed before.
    SizesAdded(Vec<AvailableSize>),
    /// Price went down.
    PriceDropped {
        /// Price before the change.
        old_price: String,
    },
    /// Price went up (only when enabled in config).
    PriceIncreased {
        /// Price before the change.
        old_price: String,
    },
    /// Product became purchasable again.
    BackForSale,
    /// Raw keyword queries that matched a new arrival.
    KeywordMatch(Vec<String>),
}

/// One merged outbound message for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Message category.
    pub kind: NotificationKind,
    /// The product as observed.
    pub snapshot: ProductSnapshot,
    /// Every trigger for this observation.
    pub reasons: Vec<NotifyReason>,
}

/// Delivers notifications. Calls must not block the caller for long.
pub trait Notifier: Send + Sync + 'static {
    /// Send a notification, fire-and-forget.
    fn notify(&self, notification: Notification);
}

/// Whole-document persistence of product and query state.
pub trait StateStore: Send + Sync + 'static {
    /// Load the document, creating a default one if none exists.
    ///
    /// # Errors
    ///
    /// `Storage` when the backing store cannot be read or parsed.
    fn load(&self) -> Result<ProductStates, MonitorError>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// `Storage` when the write fails.
    fn save(&self, states: &ProductStates) -> Result<(), MonitorError>;
}

/// Named proxy-list persistence.
pub trait ProxyStore: Send + Sync + 'static {
    /// Load a proxy list by name. An empty name yields an empty list.
    ///
    /// # Errors
    ///
    /// `Storage` when the list cannot be read or a line is malformed.
    fn load(&self, name: &str) -> Result<Vec<Proxy>, MonitorError>;

    /// Replace a named proxy list.
    ///
    /// # Errors
    ///
    /// `Storage` when the write fails.
    fn save(&self, name: &str, proxies: &[Proxy]) -> Result<(), MonitorError>;
}
