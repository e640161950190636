//! Builders to assemble the monitor from configuration.

pub mod monitor_builder;

pub use monitor_builder::MonitorBuilder;
