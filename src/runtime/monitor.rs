//! The assembled monitor: both task groups, the shared pool, persistence and
//! optional config hot reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::MonitorConfig;
use crate::core::{
    ControlSurface, DiscoveryGroup, MonitorContext, MonitorError, NormalGroup, ProxyPool,
    SharedStates,
};
use crate::runtime::config_watcher::{ConfigReloader, ConfigWatcher};

/// Running application context. Build it with
/// [`crate::builders::MonitorBuilder`].
#[derive(Debug)]
pub struct Monitor {
    ctx: MonitorContext,
    normal: Arc<NormalGroup>,
    discovery: Arc<DiscoveryGroup>,
    reloader: Arc<ConfigReloader>,
    config_path: Option<PathBuf>,
    watcher: Mutex<Option<ConfigWatcher>>,
}

impl Monitor {
    pub(crate) fn new(
        ctx: MonitorContext,
        normal: Arc<NormalGroup>,
        discovery: Arc<DiscoveryGroup>,
        reloader: Arc<ConfigReloader>,
        config_path: Option<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            normal,
            discovery,
            reloader,
            config_path,
            watcher: Mutex::new(None),
        }
    }

    /// Start both task groups and, when built from a file, the config
    /// watcher. On error nothing is left running.
    ///
    /// A stopped monitor must be [`recover`](Self::recover)ed before it can
    /// start again.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` if a task was already started, `Spawn` if a thread
    /// cannot be created.
    pub fn start(&self) -> Result<(), MonitorError> {
        let config = self.reloader.current();
        self.normal.start(config.normal.burst_start)?;
        if let Err(e) = self.discovery.start(config.discovery.burst_start) {
            self.normal.stop();
            return Err(e);
        }

        if let Some(path) = &self.config_path {
            match ConfigWatcher::spawn(path, Arc::clone(&self.reloader), ConfigWatcher::DEFAULT_INTERVAL) {
                Ok(watcher) => *self.watcher.lock() = Some(watcher),
                Err(e) => {
                    self.discovery.stop();
                    self.normal.stop();
                    return Err(e);
                }
            }
        }
        tracing::info!(
            normal_tasks = self.normal.task_group().len(),
            discovery_tasks = self.discovery.task_group().len(),
            proxies = self.ctx.pool.len(),
            "monitor started"
        );
        Ok(())
    }

    /// Stop the watcher and every task. Idempotent.
    pub fn stop(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.stop();
        }
        self.discovery.stop();
        self.normal.stop();
    }

    /// Block until every started task has terminated.
    pub fn wait(&self) {
        self.discovery.task_group().wait();
        self.normal.task_group().wait();
    }

    /// Like [`Self::wait`], bounded by `timeout` overall. Returns whether all
    /// tasks terminated.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.discovery.task_group().wait_deadline(deadline)
            && self.normal.task_group().wait_deadline(deadline)
    }

    /// Return every stopped task to `Ready` so [`Self::start`] can run again.
    ///
    /// # Errors
    ///
    /// `TaskStillRunning` if a task has not been stopped.
    pub fn recover(&self) -> Result<(), MonitorError> {
        self.normal.task_group().recover_all()?;
        self.discovery.task_group().recover_all()
    }

    /// Stop, wait for tasks and flush pending state writes.
    pub fn shutdown(&self) {
        self.stop();
        self.wait();
        self.ctx.persist.shutdown();
        tracing::info!("monitor shut down");
    }

    /// Add/remove/list surface for control-plane transports.
    #[must_use]
    pub fn control(&self) -> ControlSurface {
        ControlSurface::new(Arc::clone(&self.normal), Arc::clone(&self.discovery))
    }

    /// Configuration currently in effect.
    #[must_use]
    pub fn config(&self) -> MonitorConfig {
        self.reloader.current()
    }

    /// Apply a configuration without going through the file. Returns whether
    /// anything changed.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if validation fails.
    pub fn apply_config(&self, config: MonitorConfig) -> Result<bool, MonitorError> {
        config.validate().map_err(MonitorError::InvalidConfig)?;
        Ok(self.reloader.apply(config))
    }

    /// The normal group.
    #[must_use]
    pub const fn normal(&self) -> &Arc<NormalGroup> {
        &self.normal
    }

    /// The discovery group.
    #[must_use]
    pub const fn discovery(&self) -> &Arc<DiscoveryGroup> {
        &self.discovery
    }

    /// The shared proxy pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<ProxyPool> {
        &self.ctx.pool
    }

    /// Shared state document.
    #[must_use]
    pub const fn states(&self) -> &SharedStates {
        &self.ctx.states
    }

    /// Block until all requested state writes have completed.
    pub fn flush(&self) {
        self.ctx.persist.flush();
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
