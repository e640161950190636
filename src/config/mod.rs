//! Configuration models for task groups, the proxy pool and scheduling.

pub mod monitor;

pub use monitor::{MonitorConfig, SchedulerConfig, TaskClassConfig};
