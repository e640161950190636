//! Builder to assemble a [`Monitor`] from configuration and collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};

use crate::config::MonitorConfig;
use crate::core::{
    AppResult, DiscoveryGroup, MonitorContext, NormalGroup, Notifier, PageFetcher,
    PersistenceDispatcher, ProxyPool, ProxyStore, SharedStates, StateStore,
};
use crate::infra::{InMemoryProxyStore, InMemoryStateStore, TracingNotifier};
use crate::runtime::{ConfigReloader, Monitor};

/// Collects configuration and ports, then wires the monitor together.
///
/// Only the fetcher is mandatory. State defaults to memory, proxies to an
/// empty store and notifications to the log.
///
/// ```rust,ignore
/// let monitor = MonitorBuilder::from_config_file("config.json")?
///     .with_fetcher(Arc::new(my_fetcher))
///     .with_state_store(Arc::new(JsonStateStore::new("productStates.json")))
///     .with_proxy_store(Arc::new(ProxyFile::new("proxies")))
///     .build()?;
/// monitor.start()?;
/// ```
#[derive(Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
    config_path: Option<PathBuf>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    notifier: Option<Arc<dyn Notifier>>,
    state_store: Option<Arc<dyn StateStore>>,
    proxy_store: Option<Arc<dyn ProxyStore>>,
}

impl MonitorBuilder {
    /// Start from default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or create) the configuration file and watch it for changes once
    /// the monitor starts.
    ///
    /// # Errors
    ///
    /// See [`MonitorConfig::load_or_create`].
    pub fn from_config_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let config = MonitorConfig::load_or_create(path)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    /// Use this configuration.
    #[must_use]
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Product data source.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Notification sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// State document store.
    #[must_use]
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Proxy list store.
    #[must_use]
    pub fn with_proxy_store(mut self, store: Arc<dyn ProxyStore>) -> Self {
        self.proxy_store = Some(store);
        self
    }

    /// Load state and proxies, create both groups and their tasks.
    ///
    /// # Errors
    ///
    /// Missing fetcher, invalid configuration, unreadable state or proxy
    /// list, or a thread that cannot be spawned.
    pub fn build(self) -> AppResult<Monitor> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| anyhow!("config invalid: {e}"))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| anyhow!("a page fetcher is required"))?;
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn Notifier>);
        let state_store = self
            .state_store
            .unwrap_or_else(|| Arc::new(InMemoryStateStore::default()) as Arc<dyn StateStore>);
        let proxy_store = self
            .proxy_store
            .unwrap_or_else(|| Arc::new(InMemoryProxyStore::default()) as Arc<dyn ProxyStore>);

        let states = SharedStates::new(state_store.load().context("loading product states")?);
        let proxies = proxy_store
            .load(&config.proxyfile)
            .with_context(|| format!("loading proxy list `{}`", config.proxyfile))?;
        let pool = Arc::new(ProxyPool::new(
            config.proxyfile.clone(),
            proxies,
            config.pool_settings(),
            Some(Arc::clone(&proxy_store)),
        ));
        let persist = Arc::new(
            PersistenceDispatcher::new(states.clone(), state_store)
                .context("starting state writer")?,
        );

        let ctx = MonitorContext {
            states,
            pool: Arc::clone(&pool),
            fetcher,
            notifier,
            persist,
        };
        let normal = NormalGroup::new(ctx.clone(), config.normal_settings());
        let discovery = DiscoveryGroup::new(
            ctx.clone(),
            Arc::clone(&normal),
            config.discovery.poll_interval(),
        );
        normal
            .spawn_tasks(config.normal.num_tasks)
            .context("creating normal tasks")?;
        discovery
            .spawn_tasks(config.discovery.num_tasks)
            .context("creating discovery tasks")?;

        let reloader = Arc::new(ConfigReloader::new(
            config,
            pool,
            proxy_store,
            Arc::clone(&normal),
            Arc::clone(&discovery),
        ));
        Ok(Monitor::new(
            ctx,
            normal,
            discovery,
            reloader,
            self.config_path,
        ))
    }
}

impl std::fmt::Debug for MonitorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorBuilder")
            .field("config", &self.config)
            .field("config_path", &self.config_path)
            .field("has_fetcher", &self.fetcher.is_some())
            .finish_non_exhaustive()
    }
}
