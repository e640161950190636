//! Tests for file-backed state and proxy stores

use restock_sentinel::core::{ProductStates, ProxyStore, SkuQuery, StateStore};
use restock_sentinel::infra::{JsonStateStore, ProxyFile};

#[test]
fn test_state_file_keeps_discovery_under_load_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("productStates.json");
    let store = JsonStateStore::new(&path);

    let mut states = ProductStates::default();
    states.discovery.keyword_queries.push("+dunk".into());
    states.discovery.record_notified(&SkuQuery::new("X1"), vec!["+dunk".into()]);
    store.save(&states).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["load"]["keywordQueries"][0], "+dunk");
    assert_eq!(raw["load"]["notifiedProducts"][0]["matchingKeywordQueries"][0], "+dunk");
    assert_eq!(store.load().unwrap(), states);
}

#[test]
fn test_proxy_file_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProxyFile::new(dir.path());
    assert!(store.load("missing").is_err());

    let proxies = vec![
        restock_sentinel::core::Proxy::parse_line("1.1.1.1:80:a:b").unwrap(),
        restock_sentinel::core::Proxy::parse_line("2.2.2.2:81:c:d").unwrap(),
    ];
    store.save("dc", &proxies).unwrap();
    assert_eq!(store.load("dc").unwrap(), proxies);
}
