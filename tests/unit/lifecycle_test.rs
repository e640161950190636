//! Tests for task groups driving real task lifecycles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use restock_sentinel::core::{
    LeasedProxy, MonitorError, PoolSettings, Proxy, ProxyPool, Runnable, StartOptions,
    TaskGroup, TaskLifecycle, TaskRoutine, TaskStatus,
};

use crate::common::wait_until;

struct Counter {
    cycles: AtomicUsize,
    with_proxy: AtomicUsize,
}

#[async_trait]
impl TaskRoutine for Counter {
    async fn run_cycle(&self, proxy: Option<&LeasedProxy>) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        if proxy.is_some() {
            self.with_proxy.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(5)
    }
}

fn group_of(n: usize, pool: &Arc<ProxyPool>) -> (TaskGroup, Arc<Counter>) {
    let counter = Arc::new(Counter {
        cycles: AtomicUsize::new(0),
        with_proxy: AtomicUsize::new(0),
    });
    let group = TaskGroup::new("test");
    for i in 0..n {
        let task = TaskLifecycle::new(
            format!("test-{i}"),
            Arc::clone(&counter) as Arc<dyn TaskRoutine>,
            Arc::clone(pool),
            None,
        );
        group.add_task(Arc::new(task)).unwrap();
    }
    (group, counter)
}

fn direct_pool() -> Arc<ProxyPool> {
    Arc::new(ProxyPool::new("", Vec::new(), PoolSettings::default(), None))
}

#[test]
fn test_group_start_stop_recover_restart() {
    let pool = direct_pool();
    let (group, counter) = group_of(3, &pool);
    let options = StartOptions {
        burst_start: false,
        poll_interval: Duration::from_millis(5),
    };

    group.start_all(options).unwrap();
    assert!(wait_until(Duration::from_secs(2), || group
        .tasks()
        .iter()
        .all(|t| t.status() == TaskStatus::Running)));
    assert!(wait_until(Duration::from_secs(2), || counter.cycles.load(Ordering::SeqCst) >= 6));
    assert_eq!(group.start_all(options), Err(MonitorError::TaskNotReady));
    assert_eq!(group.recover_all(), Err(MonitorError::TaskStillRunning));

    group.stop_all();
    assert!(group.wait_timeout(Duration::from_secs(2)));
    assert!(group.tasks().iter().all(|t| t.status() == TaskStatus::Stopped));

    group.recover_all().unwrap();
    let before = counter.cycles.load(Ordering::SeqCst);
    group.start_all(options).unwrap();
    assert!(wait_until(Duration::from_secs(2), || counter.cycles.load(Ordering::SeqCst) > before));
    group.stop_all();
    group.wait();
}

#[test]
fn test_stop_during_jitter_aborts_launch() {
    let pool = direct_pool();
    let (group, _counter) = group_of(4, &pool);

    group
        .start_all(StartOptions {
            burst_start: true,
            poll_interval: Duration::from_secs(30),
        })
        .unwrap();
    group.stop_all();

    assert!(group.wait_timeout(Duration::from_secs(2)));
    assert!(group.tasks().iter().all(|t| t.status() != TaskStatus::Running));
}

#[test]
fn test_running_task_cannot_be_added_or_removed() {
    let pool = direct_pool();
    let (group, _counter) = group_of(1, &pool);
    let task = group.tasks().remove(0);

    task.start().unwrap();
    assert_eq!(group.remove_task(&task), Err(MonitorError::TaskStillRunning));
    assert_eq!(group.add_task(Arc::clone(&task)), Err(MonitorError::TaskNotReady));

    task.stop();
    task.wait_for_termination();
    group.remove_task(&task).unwrap();
    assert!(group.is_empty());
}

#[test]
fn test_tasks_share_a_capped_pool() {
    let proxies = vec![Proxy::parse_line("10.9.0.1:80:u:p").unwrap()];
    let pool = Arc::new(ProxyPool::new(
        "one",
        proxies,
        PoolSettings {
            max_leases_per_proxy: 1,
            remove_bad_proxies: false,
        },
        None,
    ));
    let (group, counter) = group_of(3, &pool);
    group
        .start_all(StartOptions {
            burst_start: false,
            poll_interval: Duration::from_millis(5),
        })
        .unwrap();

    // Leases rotate every cycle, so the single proxy keeps serving.
    assert!(wait_until(Duration::from_secs(3), || counter.with_proxy.load(Ordering::SeqCst) >= 9));
    assert!(pool.outstanding() <= 1);

    group.stop_all();
    assert!(group.wait_timeout(Duration::from_secs(2)));
    assert_eq!(pool.outstanding(), 0);
}
