//! Error types for monitor operations.

use thiserror::Error;

/// Errors produced by monitor components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Lifecycle misuse: the task is not in the `Ready` state.
    #[error("task not ready")]
    TaskNotReady,
    /// Lifecycle misuse: the task is still running.
    #[error("task still running")]
    TaskStillRunning,
    /// The query is already monitored.
    #[error("{kind} \"{value}\" is already being monitored")]
    AlreadyMonitored {
        /// Query kind label (`SKU` or `KEYWORD`).
        kind: String,
        /// Normalized query value.
        value: String,
    },
    /// The query is not monitored.
    #[error("{kind} \"{value}\" not found")]
    QueryNotFound {
        /// Query kind label (`SKU` or `KEYWORD`).
        kind: String,
        /// Normalized query value.
        value: String,
    },
    /// An outbound request failed before a status code was received.
    #[error("{location}: request failed: {reason}{}", proxy_suffix(.proxy))]
    RequestFailed {
        /// Operation that issued the request.
        location: String,
        /// Transport-level failure description (timeouts included).
        reason: String,
        /// Proxy used for the request, if any.
        proxy: Option<String>,
    },
    /// An outbound request returned a non-success status code.
    #[error("{location}: request failed with status code {status}{}", proxy_suffix(.proxy))]
    StatusCodeFailed {
        /// Operation that issued the request.
        location: String,
        /// HTTP status code.
        status: u16,
        /// Proxy used for the request, if any.
        proxy: Option<String>,
    },
    /// Ledger misuse: the entry is already present.
    #[error("{kind} \"{value}\" already included in {states} product states")]
    AlreadyIncluded {
        /// Ledger name (`normal` or `discovery`).
        states: String,
        /// Entry kind.
        kind: String,
        /// Entry value.
        value: String,
    },
    /// Ledger misuse: the entry is absent.
    #[error("{kind} \"{value}\" not included in {states} product states")]
    NotIncluded {
        /// Ledger name (`normal` or `discovery`).
        states: String,
        /// Entry kind.
        kind: String,
        /// Entry value.
        value: String,
    },
    /// Control-surface query value is empty after normalization.
    #[error("invalid {kind} query: \"{value}\"")]
    InvalidQuery {
        /// Query kind label (`SKU` or `KEYWORD`).
        kind: String,
        /// Raw query value.
        value: String,
    },
    /// Control-surface query kind could not be parsed.
    #[error("unexpected input type: {0}")]
    UnknownQueryKind(String),
    /// State or proxy-list storage failure.
    #[error("storage error: {0}")]
    Storage(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker or launcher thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

impl MonitorError {
    /// Whether this is a 403-class response, which marks the proxy as bad.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::StatusCodeFailed { status: 403, .. })
    }

    /// Whether this error is a transient per-call request failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::StatusCodeFailed { .. })
    }
}

fn proxy_suffix(proxy: &Option<String>) -> String {
    proxy
        .as_ref()
        .map(|p| format!(" Proxy: {p}"))
        .unwrap_or_default()
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
