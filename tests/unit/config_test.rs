//! Tests for configuration parsing and conversion

use std::time::Duration;

use restock_sentinel::config::MonitorConfig;

#[test]
fn test_empty_document_is_default() {
    let cfg = MonitorConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, MonitorConfig::default());
    assert!(cfg.proxyfile.is_empty());
    assert!(!cfg.auto_remove_bad_proxy);
    assert!(!cfg.notify_price_increase);
}

#[test]
fn test_camel_case_keys() {
    let cfg = MonitorConfig::from_json_str(
        r#"{
            "normal": {"pollIntervalMs": 2500, "burstStart": false, "numTasks": 3},
            "discovery": {"pollIntervalMs": 750},
            "maxLeasesPerProxy": 5,
            "proxyfile": "residential",
            "autoRemoveBadProxy": true,
            "scheduler": {"batchSize": 20, "unloadThreshold": 4, "sizeResetThreshold": 3}
        }"#,
    )
    .unwrap();

    let normal = cfg.normal_settings();
    assert_eq!(normal.poll_interval, Duration::from_millis(2500));
    assert_eq!(normal.scheduler.batch_size, 20);
    assert_eq!(normal.scheduler.unload_threshold, 4);
    assert_eq!(normal.scheduler.size_reset_threshold, 3);
    assert!(!cfg.normal.burst_start);
    assert_eq!(cfg.discovery.poll_interval(), Duration::from_millis(750));
    assert_eq!(cfg.discovery.num_tasks, 1);

    let pool = cfg.pool_settings();
    assert_eq!(pool.max_leases_per_proxy, 5);
    assert!(pool.remove_bad_proxies);
}

#[test]
fn test_zero_batch_size_rejected() {
    let err = MonitorConfig::from_json_str(r#"{"scheduler": {"batchSize": 0}}"#).unwrap_err();
    assert!(err.contains("batchSize"));
}

#[test]
fn test_serializes_camel_case() {
    let json = serde_json::to_value(MonitorConfig::default()).unwrap();
    assert_eq!(json["normal"]["pollIntervalMs"], 5000);
    assert_eq!(json["maxLeasesPerProxy"], 2);
    assert_eq!(json["scheduler"]["sizeResetThreshold"], 2);
}
