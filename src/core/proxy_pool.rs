//! Shared proxy pool with a per-proxy lease cap.
//!
//! Uses a `parking_lot::Mutex` for the proxy list and usage accounting and a
//! `parking_lot::Condvar` to park tasks while every proxy is at its cap.
//! Usage is keyed by [`ProxyId`], assigned when a proxy enters the pool, so
//! two identical proxy lines are still two distinct resources.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::ports::ProxyStore;
use crate::core::MonitorError;

/// Egress proxy endpoint with credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    /// Hostname or IP address.
    pub host: String,
    /// Port, kept as text the way proxy lists store it.
    pub port: String,
    /// Username (may be empty).
    pub username: String,
    /// Password (may be empty).
    pub password: String,
}

impl Proxy {
    /// Parse a `host:port:username:password` line.
    ///
    /// # Errors
    ///
    /// `Storage` if the line does not have exactly four fields.
    pub fn parse_line(line: &str) -> Result<Self, MonitorError> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        let [host, port, username, password] = parts.as_slice() else {
            return Err(MonitorError::Storage(format!(
                "invalid proxy format in line: {line}"
            )));
        };
        Ok(Self {
            host: (*host).to_owned(),
            port: (*port).to_owned(),
            username: (*username).to_owned(),
            password: (*password).to_owned(),
        })
    }

    /// Format as a `host:port:username:password` line.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}:{}:{}:{}", self.host, self.port, self.username, self.password)
    }

    /// Proxy URL usable by an HTTP client.
    #[must_use]
    pub fn url(&self) -> String {
        if self.username.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!(
                "http://{}:{}@{}:{}",
                self.username, self.password, self.host, self.port
            )
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Identity of a proxy inside one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(u64);

/// A proxy as held by the pool and handed out by [`ProxyPool::lease`].
#[derive(Debug)]
pub struct LeasedProxy {
    id: ProxyId,
    proxy: Proxy,
}

impl LeasedProxy {
    /// Pool identity.
    #[must_use]
    pub const fn id(&self) -> ProxyId {
        self.id
    }

    /// Endpoint details.
    #[must_use]
    pub const fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

impl fmt::Display for LeasedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.proxy.fmt(f)
    }
}

/// Outcome of [`ProxyPool::lease`].
#[derive(Debug, Clone)]
pub enum Lease {
    /// A proxy was granted and must be released.
    Granted(Arc<LeasedProxy>),
    /// The pool is empty; requests go out directly.
    Direct,
    /// The caller's cancellation token fired while waiting.
    Cancelled,
}

/// Hot-reloadable pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum concurrent leases per proxy.
    pub max_leases_per_proxy: u32,
    /// Evict a proxy on its first bad report.
    pub remove_bad_proxies: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_leases_per_proxy: 2,
            remove_bad_proxies: false,
        }
    }
}

struct PoolState {
    list_name: String,
    proxies: Vec<Arc<LeasedProxy>>,
    usage: HashMap<ProxyId, u32>,
    settings: PoolSettings,
}

impl PoolState {
    /// Take the first proxy below its cap and move it to the back.
    fn take_available(&mut self) -> Option<Arc<LeasedProxy>> {
        let cap = self.settings.max_leases_per_proxy.max(1);
        let index = self
            .proxies
            .iter()
            .position(|p| self.usage.get(&p.id).copied().unwrap_or(0) < cap)?;

        let proxy = Arc::clone(&self.proxies[index]);
        *self.usage.entry(proxy.id).or_insert(0) += 1;

        if self.proxies.len() > 1 {
            let rotated = self.proxies.remove(index);
            self.proxies.push(rotated);
        }
        Some(proxy)
    }
}

/// Bounded proxy pool shared by every task.
pub struct ProxyPool {
    state: Arc<Mutex<PoolState>>,
    available: Condvar,
    next_id: AtomicU64,
    store: Option<Arc<dyn ProxyStore>>,
    write_lock: Arc<Mutex<()>>,
}

impl ProxyPool {
    /// Create a pool over an initial proxy list. An empty list is valid and
    /// means direct egress.
    pub fn new(
        list_name: impl Into<String>,
        proxies: Vec<Proxy>,
        settings: PoolSettings,
        store: Option<Arc<dyn ProxyStore>>,
    ) -> Self {
        let pool = Self {
            state: Arc::new(Mutex::new(PoolState {
                list_name: list_name.into(),
                proxies: Vec::new(),
                usage: HashMap::new(),
                settings,
            })),
            available: Condvar::new(),
            next_id: AtomicU64::new(0),
            store,
            write_lock: Arc::new(Mutex::new(())),
        };

        {
            let mut state = pool.state.lock();
            state.proxies = pool.wrap(proxies);
            if state.proxies.is_empty() {
                tracing::warn!("running without proxies");
            }
        }
        pool
    }

    fn wrap(&self, proxies: Vec<Proxy>) -> Vec<Arc<LeasedProxy>> {
        let mut wrapped: Vec<_> = proxies
            .into_iter()
            .map(|proxy| {
                Arc::new(LeasedProxy {
                    id: ProxyId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                    proxy,
                })
            })
            .collect();
        wrapped.shuffle(&mut rand::rng());
        wrapped
    }

    /// Lease a proxy, blocking while every proxy is at its cap.
    ///
    /// Returns `Direct` when the pool is empty and `Cancelled` once `cancel`
    /// fires; a cancelled waiter must be woken through [`Self::interrupt`].
    pub fn lease(&self, cancel: &CancellationToken) -> Lease {
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() {
                // Hand any wakeup we consumed to the next waiter.
                self.available.notify_one();
                return Lease::Cancelled;
            }
            if state.proxies.is_empty() {
                return Lease::Direct;
            }
            if let Some(proxy) = state.take_available() {
                tracing::trace!(proxy = %proxy, "proxy leased");
                return Lease::Granted(proxy);
            }
            self.available.wait(&mut state);
        }
    }

    /// Return a leased proxy. Leases from before a reload are ignored.
    pub fn release(&self, proxy: &LeasedProxy) {
        let mut state = self.state.lock();
        if let Some(usage) = state.usage.get_mut(&proxy.id) {
            *usage = usage.saturating_sub(1);
        }
        drop(state);
        self.available.notify_one();
    }

    /// Report a proxy that was refused by the target. Evicts it immediately
    /// when eviction is enabled and persists the remaining list in the
    /// background.
    pub fn report_bad(&self, proxy: &LeasedProxy) {
        let mut state = self.state.lock();
        if !state.settings.remove_bad_proxies {
            return;
        }
        let Some(index) = state.proxies.iter().position(|p| p.id == proxy.id) else {
            return;
        };

        state.proxies.remove(index);
        state.usage.remove(&proxy.id);
        tracing::warn!(proxy = %proxy, remaining = state.proxies.len(), "removed bad proxy");
        if state.proxies.is_empty() {
            tracing::warn!("no good proxies left, running without proxies");
        }
        drop(state);

        self.available.notify_all();
        self.persist_in_background();
    }

    fn persist_in_background(&self) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let state = Arc::clone(&self.state);
        let write_lock = Arc::clone(&self.write_lock);

        let spawned = thread::Builder::new()
            .name("proxy-list-writer".into())
            .spawn(move || {
                let _writing = write_lock.lock();
                let (name, proxies) = {
                    let state = state.lock();
                    let proxies: Vec<Proxy> =
                        state.proxies.iter().map(|p| p.proxy.clone()).collect();
                    (state.list_name.clone(), proxies)
                };
                if name.is_empty() {
                    return;
                }
                if let Err(e) = store.save(&name, &proxies) {
                    tracing::error!(list = %name, error = %e, "failed to persist proxy list");
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn proxy list writer");
        }
    }

    /// Replace the proxy list wholesale, resetting usage and waking every
    /// waiter so it re-evaluates against the new list.
    pub fn reload(&self, list_name: impl Into<String>, proxies: Vec<Proxy>) {
        let wrapped = self.wrap(proxies);
        let mut state = self.state.lock();
        state.list_name = list_name.into();
        state.proxies = wrapped;
        state.usage.clear();
        tracing::info!(list = %state.list_name, count = state.proxies.len(), "proxy list reloaded");
        drop(state);
        self.available.notify_all();
    }

    /// Apply new cap/eviction settings.
    pub fn apply_settings(&self, settings: PoolSettings) {
        let mut state = self.state.lock();
        if state.settings == settings {
            return;
        }
        state.settings = settings;
        drop(state);
        self.available.notify_all();
    }

    /// Wake every waiter so cancelled tasks can observe their token.
    pub fn interrupt(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }

    /// Number of proxies currently in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().proxies.len()
    }

    /// Whether the pool runs in direct-egress mode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total leases currently outstanding.
    #[must_use]
    pub fn outstanding(&self) -> u32 {
        self.state.lock().usage.values().sum()
    }

    /// Name of the backing proxy list.
    #[must_use]
    pub fn list_name(&self) -> String {
        self.state.lock().list_name.clone()
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.state.lock().settings
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProxyPool")
            .field("list_name", &state.list_name)
            .field("proxies", &state.proxies.len())
            .field("outstanding", &state.usage.values().sum::<u32>())
            .field("settings", &state.settings)
            .finish_non_exhaustive()
    }
}
