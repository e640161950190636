//! Tests for error types

use restock_sentinel::core::{MonitorError, QueryKind};

#[test]
fn test_already_monitored_error() {
    let err = MonitorError::AlreadyMonitored {
        kind: "SKU".into(),
        value: "DD1391-100".into(),
    };
    assert_eq!(format!("{err}"), "SKU \"DD1391-100\" is already being monitored");
}

#[test]
fn test_query_not_found_error() {
    let err = MonitorError::QueryNotFound {
        kind: "KEYWORD".into(),
        value: "+dunk".into(),
    };
    assert_eq!(format!("{err}"), "KEYWORD \"+dunk\" not found");
}

#[test]
fn test_status_code_error() {
    let err = MonitorError::StatusCodeFailed {
        location: "products by sku".into(),
        status: 429,
        proxy: None,
    };
    assert_eq!(
        format!("{err}"),
        "products by sku: request failed with status code 429"
    );
    assert!(err.is_transient());
    assert!(!err.is_forbidden());
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(MonitorError::TaskNotReady.to_string(), "task not ready");
    assert_eq!(MonitorError::TaskStillRunning.to_string(), "task still running");
    assert!(!MonitorError::TaskNotReady.is_transient());
}

#[test]
fn test_unknown_query_kind() {
    let err = "URL".parse::<QueryKind>().unwrap_err();
    assert_eq!(format!("{err}"), "unexpected input type: URL");
}
