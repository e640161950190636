//! Monitor core: proxy leasing, task lifecycles, SKU scheduling, state
//! matching and keyword queries.

pub mod context;
pub mod control;
pub mod discovery;
pub mod error;
pub mod keyword;
pub mod matcher;
pub mod normal;
pub mod persist;
pub mod ports;
pub mod product;
pub mod proxy_pool;
pub mod scheduler;
pub mod state;
pub mod task;
pub mod task_group;

pub use context::MonitorContext;
pub use control::{ControlSurface, QueryKind};
pub use discovery::DiscoveryGroup;
pub use error::{AppResult, MonitorError};
pub use keyword::{build_identifier, normalize_identifier, KeywordQuery};
pub use matcher::{MatchOutcome, MatchPolicy, StateMatcher};
pub use normal::{BatchReport, NormalGroup, NormalSettings};
pub use persist::PersistenceDispatcher;
pub use ports::{
    Notification, NotificationKind, Notifier, NotifyReason, PageFetcher, ProxyStore, StateStore,
};
pub use product::{AvailableSize, ProductSnapshot, ReferenceRecord, SkuQuery};
pub use proxy_pool::{Lease, LeasedProxy, PoolSettings, Proxy, ProxyId, ProxyPool};
pub use scheduler::{SchedulerSettings, SkuScheduler};
pub use state::{
    DiscoveryStates, NormalStates, NotifiedProductState, PersistedProductState, ProductStates,
    SharedStates,
};
pub use task::{Runnable, TaskLifecycle, TaskRoutine, TaskStatus, Teardown, DEFAULT_POLL_INTERVAL};
pub use task_group::{StartOptions, TaskGroup, TerminationLatch};
