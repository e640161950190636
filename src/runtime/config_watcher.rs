//! Hot reload of the configuration file.
//!
//! A background thread re-reads the file on a fixed interval and hands any
//! changed, valid configuration to a [`ConfigReloader`], which pushes the new
//! values into the live components.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::RwLock;

use crate::config::MonitorConfig;
use crate::core::{DiscoveryGroup, MonitorError, NormalGroup, ProxyPool, ProxyStore};

/// Applies configuration changes to running components.
pub struct ConfigReloader {
    config: RwLock<MonitorConfig>,
    pool: Arc<ProxyPool>,
    proxy_store: Arc<dyn ProxyStore>,
    normal: Arc<NormalGroup>,
    discovery: Arc<DiscoveryGroup>,
}

impl ConfigReloader {
    /// Wrap the components a reload touches.
    pub fn new(
        config: MonitorConfig,
        pool: Arc<ProxyPool>,
        proxy_store: Arc<dyn ProxyStore>,
        normal: Arc<NormalGroup>,
        discovery: Arc<DiscoveryGroup>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            pool,
            proxy_store,
            normal,
            discovery,
        }
    }

    /// Configuration currently in effect.
    #[must_use]
    pub fn current(&self) -> MonitorConfig {
        self.config.read().clone()
    }

    /// Apply `next` if it differs from the current configuration. Returns
    /// whether anything changed.
    ///
    /// A proxy list that fails to load keeps the previous list in place.
    /// Task counts only take effect on the next start.
    pub fn apply(&self, mut next: MonitorConfig) -> bool {
        let mut current = self.config.write();
        if *current == next {
            return false;
        }

        if next.proxyfile != current.proxyfile {
            match self.proxy_store.load(&next.proxyfile) {
                Ok(proxies) => self.pool.reload(next.proxyfile.clone(), proxies),
                Err(e) => {
                    tracing::warn!(list = %next.proxyfile, error = %e, "failed to load proxy list, keeping current");
                    next.proxyfile.clone_from(&current.proxyfile);
                }
            }
        }
        self.pool.apply_settings(next.pool_settings());
        self.normal.apply_settings(next.normal_settings());
        self.discovery
            .set_poll_interval(next.discovery.poll_interval());

        if next.normal.num_tasks != current.normal.num_tasks
            || next.discovery.num_tasks != current.discovery.num_tasks
        {
            tracing::info!("task count changes apply on the next start");
        }

        *current = next;
        tracing::info!("config reloaded");
        true
    }
}

impl std::fmt::Debug for ConfigReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigReloader")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

/// Background thread polling the configuration file.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ConfigWatcher {
    /// Re-read interval used by the monitor.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// `Spawn` if the thread cannot be created.
    pub fn spawn(
        path: impl AsRef<Path>,
        reloader: Arc<ConfigReloader>,
        interval: Duration,
    ) -> Result<Self, MonitorError> {
        let path = path.as_ref().to_path_buf();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = {
            let path = path.clone();
            thread::Builder::new()
                .name("config-watcher".into())
                .spawn(move || loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => reload_from(&path, &reloader),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                })
                .map_err(|e| MonitorError::Spawn(e.to_string()))?
        };
        tracing::debug!(path = %path.display(), "watching config");

        Ok(Self {
            path,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// File being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("config watcher panicked");
            }
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reload_from(path: &Path, reloader: &ConfigReloader) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config");
            return;
        }
    };
    match MonitorConfig::from_json_str(&raw) {
        Ok(next) => {
            reloader.apply(next);
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config"),
    }
}
