//! The normal group: round-robin monitoring of explicitly added SKUs plus
//! SKUs promoted by discovery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::core::context::MonitorContext;
use crate::core::discovery::DiscoveryGroup;
use crate::core::matcher::{MatchPolicy, StateMatcher};
use crate::core::product::{ProductSnapshot, SkuQuery};
use crate::core::proxy_pool::LeasedProxy;
use crate::core::scheduler::{SchedulerSettings, SkuScheduler};
use crate::core::task::{TaskLifecycle, TaskRoutine, DEFAULT_POLL_INTERVAL};
use crate::core::task_group::{StartOptions, TaskGroup};
use crate::core::MonitorError;

/// Hot-reloadable settings of the normal group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalSettings {
    /// Delay between cycles of one task.
    pub poll_interval: Duration,
    /// Batch and threshold tuning.
    pub scheduler: SchedulerSettings,
    /// Notification policy.
    pub policy: MatchPolicy,
}

impl Default for NormalSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            scheduler: SchedulerSettings::default(),
            policy: MatchPolicy::default(),
        }
    }
}

/// Outcome of handling one batch response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Notifications sent for primary SKUs.
    pub notified: usize,
    /// SKUs reset to the unloaded record.
    pub unloaded: Vec<SkuQuery>,
    /// Promoted SKUs resolved and handed to discovery.
    pub resolved_promoted: Vec<SkuQuery>,
    /// Whether a state write was requested.
    pub persisted: bool,
}

/// Owns the SKU scheduler and the tasks polling it.
pub struct NormalGroup {
    ctx: MonitorContext,
    tasks: TaskGroup,
    scheduler: Mutex<SkuScheduler>,
    matcher: StateMatcher,
    discovery: RwLock<Weak<DiscoveryGroup>>,
    poll_interval_ms: AtomicU64,
}

impl NormalGroup {
    /// Build the group, seeding the scheduler from the persisted SKUs.
    pub fn new(ctx: MonitorContext, settings: NormalSettings) -> Arc<Self> {
        let primary = {
            let mut normal = ctx.states.normal();
            normal.adopt_unlisted();
            normal.skus()
        };
        tracing::info!(skus = primary.len(), "normal group loaded");

        Arc::new(Self {
            matcher: StateMatcher::new(ctx.states.clone(), settings.policy),
            scheduler: Mutex::new(SkuScheduler::new(settings.scheduler, primary)),
            tasks: TaskGroup::new("normal"),
            discovery: RwLock::new(Weak::new()),
            poll_interval_ms: AtomicU64::new(duration_ms(settings.poll_interval)),
            ctx,
        })
    }

    /// Route resolved promoted products to the discovery group.
    pub fn link_discovery(&self, discovery: &Arc<DiscoveryGroup>) {
        *self.discovery.write() = Arc::downgrade(discovery);
    }

    /// Create `count` tasks polling this group.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` if a freshly created task cannot be added.
    pub fn spawn_tasks(self: &Arc<Self>, count: usize) -> Result<(), MonitorError> {
        let offset = self.tasks.len();
        for i in 0..count {
            let routine: Arc<dyn TaskRoutine> = Arc::new(NormalCycle {
                group: Arc::downgrade(self),
            });
            let task = TaskLifecycle::new(
                format!("normal-{}", offset + i),
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

    /// Apply reloaded settings.
    pub fn apply_settings(&self, settings: NormalSettings) {
        self.poll_interval_ms
            .store(duration_ms(settings.poll_interval), Ordering::Relaxed);
        self.scheduler.lock().apply_settings(settings.scheduler);
        self.matcher.apply_policy(settings.policy);
    }

    /// One poll: serve a batch, fetch it and process the response.
    pub async fn run_cycle(&self, proxy: Option<&LeasedProxy>) {
        let batch = self.scheduler.lock().next_batch();
        if batch.is_empty() {
            tracing::debug!("no skus to monitor");
            return;
        }

        match self.ctx.fetcher.fetch_by_sku(&batch, proxy).await {
            Ok(products) => {
                self.handle_products(&batch, products);
            }
            Err(e) => {
                tracing::warn!(error = %e, skus = batch.len(), "products by sku request failed");
                if e.is_forbidden() {
                    if let Some(proxy) = proxy {
                        self.ctx.pool.report_bad(proxy);
                    }
                }
            }
        }
    }

    /// Process the products returned for `requested`.
    pub fn handle_products(
        &self,
        requested: &[SkuQuery],
        products: Vec<ProductSnapshot>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut changed = false;
        let mut observed = Vec::with_capacity(products.len());
        let mut promoted_products = Vec::new();
        let mut notifications = Vec::new();

        for product in products {
            let sku = product.sku_query();
            observed.push(sku.clone());

            let (primary, allow_size_clear) = {
                let mut scheduler = self.scheduler.lock();
                if scheduler.is_primary(&sku) {
                    let allow = scheduler.observe_sizes(&sku, product.available_sizes.is_empty());
                    (true, allow)
                } else if scheduler.is_promoted(&sku) {
                    (false, false)
                } else {
                    continue;
                }
            };

            if primary {
                let outcome = self.matcher.match_snapshot(&product, allow_size_clear);
                changed |= outcome.changed;
                notifications.extend(outcome.notification);
            } else if !report.resolved_promoted.contains(&sku) {
                report.resolved_promoted.push(sku);
                promoted_products.push(product);
            }
        }

        let unload = {
            let mut scheduler = self.scheduler.lock();
            scheduler.resolve_promoted(&report.resolved_promoted);
            scheduler.record_batch_result(requested, &observed)
        };
        for sku in unload {
            changed |= self.matcher.reset_unloaded(&sku);
            report.unloaded.push(sku);
        }

        report.notified = notifications.len();
        for notification in notifications {
            self.ctx.notifier.notify(notification);
        }

        if changed {
            self.ctx.persist.request();
            report.persisted = true;
        }

        if !promoted_products.is_empty() {
            let discovery = self.discovery.read().upgrade();
            match discovery {
                Some(discovery) => discovery.handle_promoted_products(&promoted_products),
                None => tracing::warn!("promoted products resolved without a discovery group"),
            }
        }

        report
    }

    /// Inject discovery SKUs. Returns how many were accepted.
    pub fn promote(&self, skus: impl IntoIterator<Item = SkuQuery>) -> usize {
        let mut scheduler = self.scheduler.lock();
        let accepted = skus
            .into_iter()
            .filter(|sku| scheduler.promote(sku.clone()))
            .count();
        drop(scheduler);
        if accepted > 0 {
            tracing::info!(count = accepted, "promoted new products");
        }
        accepted
    }

    /// Whether a SKU is in the primary set.
    #[must_use]
    pub fn is_monitored(&self, sku: &SkuQuery) -> bool {
        self.scheduler.lock().is_primary(sku)
    }

    /// Start monitoring a SKU.
    ///
    /// # Errors
    ///
    /// `AlreadyIncluded` if the SKU is already monitored.
    pub fn add_sku(&self, sku: &SkuQuery) -> Result<(), MonitorError> {
        self.ctx.states.normal().add_sku(sku)?;
        self.scheduler.lock().add_primary(sku.clone());
        self.ctx.persist.request();
        tracing::info!(sku = %sku, "sku added");
        Ok(())
    }

    /// Stop monitoring a SKU and forget its state.
    ///
    /// # Errors
    ///
    /// `NotIncluded` if the SKU is not monitored.
    pub fn remove_sku(&self, sku: &SkuQuery) -> Result<(), MonitorError> {
        self.ctx.states.normal().remove_sku(sku)?;
        self.scheduler.lock().remove_primary(sku);
        self.ctx.persist.request();
        tracing::info!(sku = %sku, "sku removed");
        Ok(())
    }

    /// Primary SKUs in rotation order.
    #[must_use]
    pub fn list_skus(&self) -> Vec<String> {
        self.scheduler
            .lock()
            .primary()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Promoted SKUs still waiting to be resolved.
    #[must_use]
    pub fn pending_promoted(&self) -> Vec<SkuQuery> {
        self.scheduler.lock().promoted().to_vec()
    }
}

impl std::fmt::Debug for NormalGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalGroup")
            .field("tasks", &self.tasks)
            .field("poll_interval", &self.poll_interval())
            .finish_non_exhaustive()
    }
}

/// Routine run by each normal task. Holds the group weakly so tasks never
/// keep it alive.
struct NormalCycle {
    group: Weak<NormalGroup>,
}

#[async_trait]
impl TaskRoutine for NormalCycle {
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

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
