//! The discovery group: watches the new-arrivals listing, promotes unseen
//! products into the normal group and alerts on keyword matches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::context::MonitorContext;
use crate::core::keyword::{normalize_identifier, KeywordQuery};
use crate::core::normal::{duration_ms, NormalGroup};
use crate::core::ports::{Notification, NotificationKind, NotifyReason};
use crate::core::product::{ProductSnapshot, ReferenceRecord, SkuQuery};
use crate::core::proxy_pool::LeasedProxy;
use crate::core::task::{TaskLifecycle, TaskRoutine, DEFAULT_POLL_INTERVAL};
use crate::core::task_group::{StartOptions, TaskGroup};
use crate::core::MonitorError;

/// Owns the keyword queries and the tasks polling the new-arrivals listing.
pub struct DiscoveryGroup {
    ctx: MonitorContext,
    tasks: TaskGroup,
    normal: Arc<NormalGroup>,
    keywords: RwLock<Vec<KeywordQuery>>,
    poll_interval_ms: AtomicU64,
}

impl DiscoveryGroup {
    /// Build the group from persisted keyword queries and link it to the
    /// normal group.
    pub fn new(ctx: MonitorContext, normal: Arc<NormalGroup>, poll_interval: Duration) -> Arc<Self> {
        let keywords = {
            let mut discovery = ctx.states.discovery();
            let mut keywords: Vec<KeywordQuery> = Vec::new();
            for raw in &discovery.keyword_queries {
                let query = KeywordQuery::compile(raw);
                if !keywords.contains(&query) {
                    keywords.push(query);
                }
            }
            // Stored queries compare by their normalized text from here on.
            discovery.keyword_queries = keywords.iter().map(|k| k.raw().to_owned()).collect();
            keywords
        };
        tracing::info!(keywords = keywords.len(), "discovery group loaded");

        let group = Arc::new(Self {
            tasks: TaskGroup::new("discovery"),
            normal,
            keywords: RwLock::new(keywords),
            poll_interval_ms: AtomicU64::new(duration_ms(poll_interval)),
            ctx,
        });
        group.normal.link_discovery(&group);
        group
    }

    /// Create `count` tasks polling the listing.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` if a freshly created task cannot be added.
    pub fn spawn_tasks(self: &Arc<Self>, count: usize) -> Result<(), MonitorError> {
        let offset = self.tasks.len();
        for i in 0..count {
            let routine: Arc<dyn TaskRoutine> = Arc::new(DiscoveryCycle {
                group: Arc::downgrade(self),
            });
            let task = TaskLifecycle::new(
                format!("discovery-{}", offset + i),
                routine,
                Arc::clone(&self.ctx.pool),
                None,
            );
            self.tasks.add_task(Arc::new(task))?;
        }
        Ok(())
    }

    /// Start all tasks.
    ///
    /// # Errors
    ///
    /// See [`TaskGroup::start_all`].
    pub fn start(&self, burst_start: bool) -> Result<(), MonitorError> {
        self.tasks.start_all(StartOptions {
            burst_start,
            poll_interval: self.poll_interval(),
        })
    }

    /// Stop all tasks.
    pub fn stop(&self) {
        self.tasks.stop_all();
    }

    /// The underlying task group.
    #[must_use]
    pub const fn task_group(&self) -> &TaskGroup {
        &self.tasks
    }

    /// Current delay between cycles.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Relaxed))
    }

    /// Apply a reloaded poll interval.
    pub fn set_poll_interval(&self, poll_interval: Duration) {
        self.poll_interval_ms
            .store(duration_ms(poll_interval), Ordering::Relaxed);
    }

    /// One poll of the new-arrivals listing.
    pub async fn run_cycle(&self, proxy: Option<&LeasedProxy>) {
        match self.ctx.fetcher.fetch_new_arrivals(proxy).await {
            Ok(records) => {
                self.handle_new_arrivals(&records);
            }
            Err(e) => {
                tracing::warn!(error = %e, "new arrivals request failed");
                if e.is_forbidden() {
                    if let Some(proxy) = proxy {
                        self.ctx.pool.report_bad(proxy);
                    }
                }
            }
        }
    }

    /// Promote every record newer than the last known pid and advance the
    /// marker. The first listing ever seen only sets the marker. Returns the
    /// number of new records.
    pub fn handle_new_arrivals(&self, records: &[ReferenceRecord]) -> usize {
        let Some(newest) = records.first() else {
            return 0;
        };

        let new_skus: Vec<SkuQuery> = {
            let mut discovery = self.ctx.states.discovery();
            if discovery.last_known_pid == newest.pid {
                tracing::debug!("no new products loaded");
                return 0;
            }
            if discovery.last_known_pid.is_empty() {
                discovery.last_known_pid.clone_from(&newest.pid);
                drop(discovery);
                tracing::info!(pid = %newest.pid, "new arrivals marker initialized");
                self.ctx.persist.request();
                return 0;
            }

            let last_known = std::mem::replace(&mut discovery.last_known_pid, newest.pid.clone());
            records
                .iter()
                .take_while(|r| r.pid != last_known)
                .map(|r| SkuQuery::new(&r.sku))
                .filter(|sku| !sku.is_empty())
                .collect()
        };
        self.ctx.persist.request();

        tracing::info!(count = new_skus.len(), "new products loaded");
        let count = new_skus.len();
        self.normal.promote(new_skus);
        count
    }

    /// Alert on resolved promoted products that match a keyword query, skip
    /// SKUs already monitored or already alerted.
    pub fn handle_promoted_products(&self, products: &[ProductSnapshot]) {
        let keywords = self.keywords.read().clone();
        if keywords.is_empty() {
            return;
        }

        let mut changed = false;
        for product in products {
            let identifier = if product.identifier.is_empty() {
                normalize_identifier(&product.title)
            } else {
                product.identifier.clone()
            };
            let matching: Vec<String> = keywords
                .iter()
                .filter(|k| k.matches(&identifier))
                .map(|k| k.raw().to_owned())
                .collect();
            if matching.is_empty() {
                continue;
            }

            let sku = product.sku_query();
            if self.normal.is_monitored(&sku) {
                continue;
            }

            {
                let mut discovery = self.ctx.states.discovery();
                if discovery.is_notified(&sku) {
                    continue;
                }
                changed |= discovery.record_notified(&sku, matching.clone());
            }

            tracing::info!(sku = %sku, keywords = ?matching, "new product matches keywords");
            self.ctx.notifier.notify(Notification {
                kind: NotificationKind::NewArrival,
                snapshot: product.clone(),
                reasons: vec![NotifyReason::KeywordMatch(matching)],
            });
        }

        if changed {
            self.ctx.persist.request();
        }
    }

    /// Start watching for a keyword query.
    ///
    /// # Errors
    ///
    /// `AlreadyIncluded` if the normalized query is already present.
    pub fn add_keyword(&self, raw: &str) -> Result<(), MonitorError> {
        let query = KeywordQuery::compile(raw);
        self.ctx.states.discovery().add_keyword(query.raw())?;
        tracing::info!(query = %query, "keyword query added");
        self.keywords.write().push(query);
        self.ctx.persist.request();
        Ok(())
    }

    /// Stop watching for a keyword query.
    ///
    /// # Errors
    ///
    /// `NotIncluded` if the normalized query is absent.
    pub fn remove_keyword(&self, raw: &str) -> Result<(), MonitorError> {
        let query = KeywordQuery::compile(raw);
        self.ctx.states.discovery().remove_keyword(query.raw())?;
        self.keywords.write().retain(|k| k != &query);
        self.ctx.persist.request();
        tracing::info!(query = %query, "keyword query removed");
        Ok(())
    }

    /// Raw keyword queries in insertion order.
    #[must_use]
    pub fn list_keywords(&self) -> Vec<String> {
        self.keywords
            .read()
            .iter()
            .map(|k| k.raw().to_owned())
            .collect()
    }
}

impl std::fmt::Debug for DiscoveryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryGroup")
            .field("tasks", &self.tasks)
            .field("keywords", &self.keywords.read().len())
            .finish_non_exhaustive()
    }
}

struct DiscoveryCycle {
    group: Weak<DiscoveryGroup>,
}

#[async_trait]
impl TaskRoutine for DiscoveryCycle {
    async fn run_cycle(&self, proxy: Option<&LeasedProxy>) {
        if let Some(group) = self.group.upgrade() {
            group.run_cycle(proxy).await;
        }
    }

    fn poll_interval(&self) -> Duration {
        self.group
            .upgrade()
            .map_or(DEFAULT_POLL_INTERVAL, |g| g.poll_interval())
    }
}
