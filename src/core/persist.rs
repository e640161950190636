//! Coalescing, fire-and-forget writer for the state document.
//!
//! Requests go through a `crossbeam_channel::bounded(1)`; while one write is
//! pending further requests collapse onto it, since the writer snapshots the
//! document only when it picks the request up.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::core::ports::StateStore;
use crate::core::state::SharedStates;
use crate::core::MonitorError;

#[derive(Debug, Default)]
struct Progress {
    requested: u64,
    written: u64,
}

#[derive(Debug, Default)]
struct Tracker {
    progress: Mutex<Progress>,
    advanced: Condvar,
}

/// Background writer for [`SharedStates`].
pub struct PersistenceDispatcher {
    requests: Mutex<Option<Sender<()>>>,
    tracker: Arc<Tracker>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceDispatcher {
    /// Spawn the writer thread.
    ///
    /// # Errors
    ///
    /// `Spawn` if the thread cannot be created.
    pub fn new(states: SharedStates, store: Arc<dyn StateStore>) -> Result<Self, MonitorError> {
        let (tx, rx) = bounded::<()>(1);
        let tracker = Arc::new(Tracker::default());

        let writer = {
            let tracker = Arc::clone(&tracker);
            thread::Builder::new()
                .name("state-writer".into())
                .spawn(move || write_loop(&rx, &states, store.as_ref(), &tracker))
                .map_err(|e| MonitorError::Spawn(e.to_string()))?
        };

        Ok(Self {
            requests: Mutex::new(Some(tx)),
            tracker,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Schedule a write. Never blocks; must be called with no state lock
    /// held.
    pub fn request(&self) {
        let requests = self.requests.lock();
        let Some(tx) = requests.as_ref() else {
            return;
        };
        self.tracker.progress.lock().requested += 1;
        match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::error!("state writer is gone, write dropped");
            }
        }
    }

    /// Block until every write requested so far has completed.
    pub fn flush(&self) {
        let mut progress = self.tracker.progress.lock();
        let target = progress.requested;
        while progress.written < target {
            self.tracker.advanced.wait(&mut progress);
        }
    }

    /// Finish pending writes and stop the writer thread.
    pub fn shutdown(&self) {
        self.flush();
        self.requests.lock().take();
        if let Some(writer) = self.writer.lock().take() {
            if writer.join().is_err() {
                tracing::error!("state writer panicked");
            }
        }
    }
}

impl Drop for PersistenceDispatcher {
    fn drop(&mut self) {
        self.requests.lock().take();
    }
}

impl std::fmt::Debug for PersistenceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let progress = self.tracker.progress.lock();
        f.debug_struct("PersistenceDispatcher")
            .field("requested", &progress.requested)
            .field("written", &progress.written)
            .finish_non_exhaustive()
    }
}

fn write_loop(rx: &Receiver<()>, states: &SharedStates, store: &dyn StateStore, tracker: &Tracker) {
    while rx.recv().is_ok() {
        let target = tracker.progress.lock().requested;

        let document = states.snapshot();
        match store.save(&document) {
            Ok(()) => tracing::debug!("product states written"),
            Err(e) => tracing::error!(error = %e, "failed to write product states"),
        }

        let mut progress = tracker.progress.lock();
        progress.written = progress.written.max(target);
        drop(progress);
        tracker.advanced.notify_all();
    }
    tracing::debug!("state writer exited");
}
