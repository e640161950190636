//! Homogeneous task sets with bulk start/stop and a termination latch.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rand::Rng;

use crate::core::task::{Runnable, TaskStatus};
use crate::core::MonitorError;

/// Countdown that releases waiters once every launched task has terminated.
#[derive(Debug, Default)]
pub struct TerminationLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl TerminationLatch {
    /// Create a latch at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the count.
    pub fn add(&self, n: usize) {
        *self.remaining.lock() += n;
    }

    /// Lower the count by one, waking waiters at zero.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    /// Block until zero or the timeout elapses. Returns whether zero was
    /// reached.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until zero or `deadline` passes. Returns whether zero was
    /// reached.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.zero.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }
}

/// Shared by the launchers of one `start_all` call. Starting happens under
/// the lock, so once `stop_all` has closed the gate no further task starts.
#[derive(Debug, Default)]
struct LaunchGate {
    closed: Mutex<bool>,
    wake: Condvar,
}

impl LaunchGate {
    fn close(&self) {
        *self.closed.lock() = true;
        self.wake.notify_all();
    }
}

/// Options for [`TaskGroup::start_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Spread task starts over a random delay in `[0, poll_interval)`.
    pub burst_start: bool,
    /// Upper bound for the startup jitter.
    pub poll_interval: Duration,
}

/// Owns a set of tasks and coordinates their lifecycle.
pub struct TaskGroup {
    name: String,
    tasks: Mutex<Vec<Arc<dyn Runnable>>>,
    latch: Arc<TerminationLatch>,
    gate: Mutex<Option<Arc<LaunchGate>>>,
}

impl TaskGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Mutex::new(Vec::new()),
            latch: Arc::new(TerminationLatch::new()),
            gate: Mutex::new(None),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a `Ready` task.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` if the task is not `Ready`.
    pub fn add_task(&self, task: Arc<dyn Runnable>) -> Result<(), MonitorError> {
        if task.status() != TaskStatus::Ready {
            return Err(MonitorError::TaskNotReady);
        }
        self.tasks.lock().push(task);
        Ok(())
    }

    /// Remove a task by identity. Unknown tasks are ignored.
    ///
    /// # Errors
    ///
    /// `TaskStillRunning` if the task is running.
    pub fn remove_task(&self, task: &Arc<dyn Runnable>) -> Result<(), MonitorError> {
        if task.status() == TaskStatus::Running {
            return Err(MonitorError::TaskStillRunning);
        }
        self.tasks.lock().retain(|t| !Arc::ptr_eq(t, task));
        Ok(())
    }

    /// Start every task, each from its own launcher thread.
    ///
    /// # Errors
    ///
    /// `TaskNotReady` if any member is not `Ready` (nothing is launched);
    /// `Spawn` if a launcher thread cannot be created.
    pub fn start_all(&self, options: StartOptions) -> Result<(), MonitorError> {
        let tasks = self.tasks();
        if tasks.iter().any(|t| t.status() != TaskStatus::Ready) {
            return Err(MonitorError::TaskNotReady);
        }

        let gate = Arc::new(LaunchGate::default());
        if let Some(previous) = self.gate.lock().replace(Arc::clone(&gate)) {
            previous.close();
        }

        tracing::info!(group = %self.name, tasks = tasks.len(), burst_start = options.burst_start, "starting tasks");

        for task in tasks {
            let delay = if options.burst_start && !options.poll_interval.is_zero() {
                rand::rng().random_range(Duration::ZERO..options.poll_interval)
            } else {
                Duration::ZERO
            };

            self.latch.add(1);
            let latch = Arc::clone(&self.latch);
            let gate = Arc::clone(&gate);
            let spawned = thread::Builder::new()
                .name(format!("launch-{}", task.name()))
                .spawn(move || launch(task.as_ref(), delay, &gate, &latch));
            if let Err(e) = spawned {
                self.latch.count_down();
                return Err(MonitorError::Spawn(e.to_string()));
            }
        }
        Ok(())
    }

    /// Stop every task and abort launches still waiting on their jitter.
    pub fn stop_all(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.close();
        }
        for task in self.tasks() {
            task.stop();
        }
        tracing::info!(group = %self.name, "tasks stopped");
    }

    /// Move every stopped task back to `Ready`.
    ///
    /// # Errors
    ///
    /// `TaskStillRunning` on the first member still running.
    pub fn recover_all(&self) -> Result<(), MonitorError> {
        self.tasks().iter().try_for_each(|t| t.recover())
    }

    /// Block until every launched task has terminated.
    pub fn wait(&self) {
        self.latch.wait();
    }

    /// Like [`Self::wait`] with an upper bound. Returns whether all tasks
    /// terminated.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }

    /// Like [`Self::wait`] until a fixed deadline.
    #[must_use]
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.latch.wait_deadline(deadline)
    }

    /// Number of member tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the group has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the member list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Arc<dyn Runnable>> {
        self.tasks.lock().clone()
    }
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("name", &self.name)
            .field("tasks", &self.len())
            .field("live", &self.latch.count())
            .finish_non_exhaustive()
    }
}

fn launch(task: &dyn Runnable, delay: Duration, gate: &LaunchGate, latch: &TerminationLatch) {
    let deadline = Instant::now() + delay;
    let mut closed = gate.closed.lock();
    while !*closed && !gate.wake.wait_until(&mut closed, deadline).timed_out() {}

    if *closed {
        drop(closed);
        tracing::debug!(task = %task.name(), "launch aborted");
        latch.count_down();
        return;
    }

    let started = task.start();
    drop(closed);

    if let Err(e) = started {
        tracing::warn!(task = %task.name(), error = %e, "task failed to start");
        latch.count_down();
        return;
    }
    task.wait_for_termination();
    latch.count_down();
}
