//! In-memory collaborators for tests and embedding.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{MonitorError, Notification, Notifier, ProductStates, Proxy, ProxyStore, StateStore};

/// State store holding the document in memory and counting writes.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    inner: Mutex<(ProductStates, usize)>,
}

impl InMemoryStateStore {
    /// Store preloaded with a document.
    #[must_use]
    pub fn with_states(states: ProductStates) -> Self {
        Self {
            inner: Mutex::new((states, 0)),
        }
    }

    /// The last saved (or preloaded) document.
    #[must_use]
    pub fn current(&self) -> ProductStates {
        self.inner.lock().0.clone()
    }

    /// Number of completed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().1
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> Result<ProductStates, MonitorError> {
        Ok(self.current())
    }

    fn save(&self, states: &ProductStates) -> Result<(), MonitorError> {
        let mut inner = self.inner.lock();
        inner.0 = states.clone();
        inner.1 += 1;
        Ok(())
    }
}

/// Named proxy lists kept in a map.
#[derive(Debug, Default)]
pub struct InMemoryProxyStore {
    lists: Mutex<HashMap<String, Vec<Proxy>>>,
    saved: Condvar,
}

impl InMemoryProxyStore {
    /// Register a list under `name`.
    pub fn insert(&self, name: impl Into<String>, proxies: Vec<Proxy>) {
        self.lists.lock().insert(name.into(), proxies);
    }

    /// Current content of a list.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<Proxy>> {
        self.lists.lock().get(name).cloned()
    }

    /// Wait until the list `name` has exactly `len` entries. Returns whether
    /// it did before the timeout.
    pub fn wait_for_len(&self, name: &str, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lists = self.lists.lock();
        while lists.get(name).map(Vec::len) != Some(len) {
            if self.saved.wait_until(&mut lists, deadline).timed_out() {
                return lists.get(name).map(Vec::len) == Some(len);
            }
        }
        true
    }
}

impl ProxyStore for InMemoryProxyStore {
    fn load(&self, name: &str) -> Result<Vec<Proxy>, MonitorError> {
        if name.is_empty() {
            return Ok(Vec::new());
        }
        self.get(name)
            .ok_or_else(|| MonitorError::Storage(format!("proxy list {name} not found")))
    }

    fn save(&self, name: &str, proxies: &[Proxy]) -> Result<(), MonitorError> {
        self.lists.lock().insert(name.to_owned(), proxies.to_vec());
        self.saved.notify_all();
        Ok(())
    }
}

/// Notifier that records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// All notifications so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Drain recorded notifications.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of notifications so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Whether nothing was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().push(notification);
    }
}
