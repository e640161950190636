//! Storage and notification adapters for the core ports.

pub mod memory;
pub mod notifier;
pub mod proxy_file;
pub mod state_file;

pub use memory::{InMemoryProxyStore, InMemoryStateStore, RecordingNotifier};
pub use notifier::TracingNotifier;
pub use proxy_file::ProxyFile;
pub use state_file::JsonStateStore;
