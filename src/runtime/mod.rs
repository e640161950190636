//! Application runtime: the assembled monitor and config hot reload.

pub mod config_watcher;
pub mod monitor;

pub use config_watcher::{ConfigReloader, ConfigWatcher};
pub use monitor::Monitor;
