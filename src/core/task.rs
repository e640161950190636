//! Cancellable, restartable units of recurring work.
//!
//! Each running task owns one OS thread with its own single-threaded tokio
//! runtime, so a slow fetch never stalls another task. The thread leases a
//! proxy per cycle, runs the routine, and sleeps for the poll interval while
//! watching its cancellation token.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::proxy_pool::{Lease, LeasedProxy, ProxyPool};
use crate::core::MonitorError;

/// Delay between cycles when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Constructed or recovered; may be started.
    Ready,
    /// Worker loop is active.
    Running,
    /// Cancelled; must be recovered before restarting.
    Stopped,
}

/// Base contract of anything a task group can drive.
pub trait Runnable: Send + Sync {
    /// Task name, used for thread names and logs.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn status(&self) -> TaskStatus;

    /// Launch the worker loop.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` unless the task is `Ready`; `Spawn` if the worker thread
    /// cannot be created.
    fn start(&self) -> Result<(), MonitorError>;

    /// Cancel the worker loop. Calling it again is a no-op.
    fn stop(&self);

    /// Move a stopped task back to `Ready`.
    ///
    /// # Errors
    ///
    /// `TaskStillRunning` if the task is running.
    fn recover(&self) -> Result<(), MonitorError>;

    /// Block until the worker loop has exited. Returns immediately if the
    /// task never started.
    fn wait_for_termination(&self);
}

/// One iteration of a task's work.
#[async_trait]
pub trait TaskRoutine: Send + Sync + 'static {
    /// Run a single cycle with the proxy leased for it (`None` means direct
    /// egress). Errors are handled inside the cycle.
    async fn run_cycle(&self, proxy: Option<&LeasedProxy>);

    /// Delay between cycles. Read every cycle so config reloads apply.
    fn poll_interval(&self) -> Duration;
}

/// Callback invoked after a task is stopped.
pub type Teardown = Box<dyn Fn() + Send + Sync>;

struct TaskState {
    status: TaskStatus,
    cancel: CancellationToken,
    generation: u64,
    live_workers: usize,
}

struct TaskShared {
    state: Mutex<TaskState>,
    exited: Condvar,
}

/// A task driving a [`TaskRoutine`] on its own worker thread.
pub struct TaskLifecycle {
    name: String,
    routine: Arc<dyn TaskRoutine>,
    pool: Arc<ProxyPool>,
    teardown: Option<Teardown>,
    shared: Arc<TaskShared>,
}

impl TaskLifecycle {
    /// Create a `Ready` task.
    pub fn new(
        name: impl Into<String>,
        routine: Arc<dyn TaskRoutine>,
        pool: Arc<ProxyPool>,
        teardown: Option<Teardown>,
    ) -> Self {
        Self {
            name: name.into(),
            routine,
            pool,
            teardown,
            shared: Arc::new(TaskShared {
                state: Mutex::new(TaskState {
                    status: TaskStatus::Ready,
                    cancel: CancellationToken::new(),
                    generation: 0,
                    live_workers: 0,
                }),
                exited: Condvar::new(),
            }),
        }
    }
}

impl Runnable for TaskLifecycle {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> TaskStatus {
        self.shared.state.lock().status
    }

    fn start(&self) -> Result<(), MonitorError> {
        let mut state = self.shared.state.lock();
        if state.status != TaskStatus::Ready {
            return Err(MonitorError::TaskNotReady);
        }

        let cancel = CancellationToken::new();
        state.generation += 1;
        state.status = TaskStatus::Running;
        state.cancel = cancel.clone();
        state.live_workers += 1;

        let worker = Worker {
            task: self.name.clone(),
            routine: Arc::clone(&self.routine),
            cancel,
            exit: WorkerExit {
                shared: Arc::clone(&self.shared),
                pool: Arc::clone(&self.pool),
                lease: None,
                generation: state.generation,
            },
        };
        drop(state);

        // On failure the dropped worker marks the task stopped again.
        thread::Builder::new()
            .name(format!("task-{}", self.name))
            .spawn(move || worker.run())
            .map_err(|e| MonitorError::Spawn(e.to_string()))?;

        tracing::info!(task = %self.name, "task started");
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.status != TaskStatus::Running {
            return;
        }
        state.cancel.cancel();
        state.status = TaskStatus::Stopped;
        drop(state);

        // A worker blocked in `lease` only sees its token after a wakeup.
        self.pool.interrupt();

        if let Some(teardown) = &self.teardown {
            teardown();
        }
        tracing::info!(task = %self.name, "task stopped");
    }

    fn recover(&self) -> Result<(), MonitorError> {
        let mut state = self.shared.state.lock();
        match state.status {
            TaskStatus::Running => Err(MonitorError::TaskStillRunning),
            TaskStatus::Stopped => {
                state.status = TaskStatus::Ready;
                Ok(())
            }
            TaskStatus::Ready => Ok(()),
        }
    }

    fn wait_for_termination(&self) {
        let mut state = self.shared.state.lock();
        while state.live_workers > 0 {
            self.shared.exited.wait(&mut state);
        }
    }
}

impl fmt::Debug for TaskLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLifecycle")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Worker-thread side of a running task.
struct Worker {
    task: String,
    routine: Arc<dyn TaskRoutine>,
    cancel: CancellationToken,
    exit: WorkerExit,
}

impl Worker {
    fn run(mut self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(task = %self.task, error = %e, "failed to create task runtime");
                return;
            }
        };

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Some(previous) = self.exit.lease.take() {
                self.exit.pool.release(&previous);
            }
            match self.exit.pool.lease(&self.cancel) {
                Lease::Granted(proxy) => self.exit.lease = Some(proxy),
                Lease::Direct => {}
                Lease::Cancelled => break,
            }

            let routine = Arc::clone(&self.routine);
            let proxy = self.exit.lease.clone();
            runtime.block_on(async move { routine.run_cycle(proxy.as_deref()).await });

            let interval = self.routine.poll_interval();
            let cancel = self.cancel.clone();
            let cancelled = runtime.block_on(async move {
                tokio::select! {
                    () = cancel.cancelled() => true,
                    () = tokio::time::sleep(interval) => false,
                }
            });
            if cancelled {
                break;
            }
        }

        tracing::debug!(task = %self.task, "task loop exited");
    }
}

/// Releases the lease and signals termination when the worker thread ends,
/// including by panic.
struct WorkerExit {
    shared: Arc<TaskShared>,
    pool: Arc<ProxyPool>,
    lease: Option<Arc<LeasedProxy>>,
    generation: u64,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        if let Some(proxy) = self.lease.take() {
            self.pool.release(&proxy);
        }

        let mut state = self.shared.state.lock();
        state.live_workers = state.live_workers.saturating_sub(1);
        if state.generation == self.generation && state.status == TaskStatus::Running {
            state.status = TaskStatus::Stopped;
        }
        drop(state);
        self.shared.exited.notify_all();
    }
}
