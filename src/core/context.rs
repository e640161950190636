//! Shared handles passed to every task group.

use std::sync::Arc;

use crate::core::persist::PersistenceDispatcher;
use crate::core::ports::{Notifier, PageFetcher};
use crate::core::proxy_pool::ProxyPool;
use crate::core::state::SharedStates;

/// Application-wide collaborators, constructed once at startup.
#[derive(Clone)]
pub struct MonitorContext {
    /// Persisted document halves.
    pub states: SharedStates,
    /// Egress proxies shared by all tasks.
    pub pool: Arc<ProxyPool>,
    /// Product data source.
    pub fetcher: Arc<dyn PageFetcher>,
    /// Notification sink.
    pub notifier: Arc<dyn Notifier>,
    /// State document writer.
    pub persist: Arc<PersistenceDispatcher>,
}

impl std::fmt::Debug for MonitorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorContext")
            .field("pool", &self.pool)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}
