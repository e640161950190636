//! Normal and discovery group handling, driven one cycle at a time.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{arrival, skus, snapshot, Harness};
use restock_sentinel::core::{
    DiscoveryGroup, MonitorError, NormalGroup, NormalSettings, NotificationKind, NotifyReason,
    PersistedProductState, ProductStates, SchedulerSettings, SkuQuery,
};

fn groups(h: &Harness, batch_size: usize) -> (Arc<NormalGroup>, Arc<DiscoveryGroup>) {
    let normal = NormalGroup::new(
        h.ctx.clone(),
        NormalSettings {
            scheduler: SchedulerSettings {
                batch_size,
                unload_threshold: 3,
                size_reset_threshold: 2,
            },
            ..NormalSettings::default()
        },
    );
    let discovery = DiscoveryGroup::new(h.ctx.clone(), Arc::clone(&normal), Duration::from_millis(50));
    (normal, discovery)
}

fn seeded(sku_list: &[&str]) -> ProductStates {
    let mut states = ProductStates::default();
    for sku in sku_list {
        states.normal.add_sku(&SkuQuery::new(sku)).unwrap();
    }
    states
}

#[tokio::test]
async fn test_restock_cycle_notifies_and_persists() {
    let h = Harness::new(seeded(&["A"]));
    let (normal, _discovery) = groups(&h, 10);

    h.fetcher.put(snapshot("A", false, &[], "100"));
    normal.run_cycle(None).await;
    assert!(h.notifier.is_empty());

    h.fetcher.put(snapshot("A", true, &["42"], "100"));
    normal.run_cycle(None).await;
    let sent = h.notifier.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Update);
    assert!(sent[0].reasons.contains(&NotifyReason::BackForSale));

    normal.run_cycle(None).await;
    assert!(h.notifier.is_empty());

    h.ctx.persist.flush();
    let saved = h.store.current();
    let state = saved.normal.get(&SkuQuery::new("A")).unwrap();
    assert!(state.available_for_sale);
    assert_eq!(state.available_sizes.len(), 1);
}

#[tokio::test]
async fn test_fetch_error_ends_cycle_quietly() {
    let h = Harness::new(seeded(&["A"]));
    let (normal, _discovery) = groups(&h, 10);
    h.fetcher.fail_with(Some(MonitorError::StatusCodeFailed {
        location: "fetch_by_sku".into(),
        status: 403,
        proxy: None,
    }));

    normal.run_cycle(None).await;
    assert_eq!(h.fetcher.requests().len(), 1);
    assert!(h.notifier.is_empty());
    assert!(h.ctx.states.normal().get(&SkuQuery::new("A")).is_none());
}

#[test]
fn test_unload_resets_state_once() {
    let mut states = seeded(&["A", "B"]);
    states.normal.upsert(PersistedProductState {
        sku: "B".into(),
        available_for_sale: true,
        available_sizes: vec![restock_sentinel::core::AvailableSize::new("40", 1)],
        price: "100".into(),
    });
    let h = Harness::new(states);
    let (normal, _discovery) = groups(&h, 2);
    let requested = skus(&["A", "B"]);

    for round in 1..=5 {
        let report = normal.handle_products(&requested, vec![snapshot("A", true, &["40"], "50")]);
        if round == 3 {
            assert_eq!(report.unloaded, skus(&["B"]));
        } else {
            assert!(report.unloaded.is_empty(), "round {round}");
        }
    }

    let b = h.ctx.states.normal().get(&SkuQuery::new("B")).cloned().unwrap();
    assert_eq!(b, PersistedProductState::unloaded("B"));
    assert!(h.notifier.is_empty());
}

#[test]
fn test_cursor_scenario_through_group() {
    let h = Harness::new(seeded(&["A", "B", "C"]));
    let (normal, _discovery) = groups(&h, 2);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(normal.run_cycle(None));
    runtime.block_on(normal.run_cycle(None));

    assert_eq!(h.fetcher.requests(), vec![skus(&["A", "B"]), skus(&["C", "A"])]);
}

#[test]
fn test_first_listing_only_sets_marker() {
    let h = Harness::new(ProductStates::default());
    let (normal, discovery) = groups(&h, 10);

    let new = discovery.handle_new_arrivals(&[arrival("p3", "X3"), arrival("p2", "X2")]);
    assert_eq!(new, 0);
    assert!(normal.pending_promoted().is_empty());
    assert_eq!(h.ctx.states.discovery().last_known_pid, "p3");
}

#[test]
fn test_new_arrivals_are_promoted_until_marker() {
    let mut states = ProductStates::default();
    states.discovery.last_known_pid = "p1".into();
    let h = Harness::new(states);
    let (normal, discovery) = groups(&h, 10);

    let listing = [arrival("p3", "X3"), arrival("p2", "X2"), arrival("p1", "X1")];
    assert_eq!(discovery.handle_new_arrivals(&listing), 2);
    assert_eq!(normal.pending_promoted(), skus(&["X3", "X2"]));
    assert_eq!(h.ctx.states.discovery().last_known_pid, "p3");

    // Same listing again: nothing new.
    assert_eq!(discovery.handle_new_arrivals(&listing), 0);
    assert_eq!(normal.pending_promoted().len(), 2);
}

#[test]
fn test_keyword_scenario_alerts_new_arrival_once() {
    let mut states = ProductStates::default();
    states.discovery.last_known_pid = "p0".into();
    let h = Harness::new(states);
    let (normal, discovery) = groups(&h, 10);
    discovery.add_keyword("+jordan -kids /red/blue").unwrap();

    discovery.handle_new_arrivals(&[arrival("p2", "J2"), arrival("p1", "J1"), arrival("p0", "Z")]);

    let mut adult = snapshot("J1", true, &["42"], "180");
    adult.identifier = "jordan retro red".into();
    let mut kids = snapshot("J2", true, &["36"], "90");
    kids.identifier = "jordan kids red".into();

    let report = normal.handle_products(&skus(&["J2", "J1"]), vec![adult.clone(), kids]);
    assert_eq!(report.resolved_promoted.len(), 2);
    assert!(normal.pending_promoted().is_empty());

    let sent = h.notifier.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::NewArrival);
    assert_eq!(sent[0].snapshot.sku, "J1");
    assert_eq!(
        sent[0].reasons,
        vec![NotifyReason::KeywordMatch(vec!["+jordan -kids /red/blue".into()])]
    );

    // Promoted again later: the ledger suppresses a second alert.
    normal.promote(skus(&["J1"]));
    normal.handle_products(&skus(&["J1"]), vec![adult]);
    assert!(h.notifier.is_empty());
    assert!(h.ctx.states.discovery().is_notified(&SkuQuery::new("J1")));
}

#[test]
fn test_keyword_match_skips_monitored_sku() {
    let h = Harness::new(seeded(&["J1"]));
    let (_normal, discovery) = groups(&h, 10);
    discovery.add_keyword("+jordan").unwrap();

    let mut product = snapshot("J1", true, &[], "100");
    product.identifier = "jordan 1".into();
    discovery.handle_promoted_products(&[product]);
    assert!(h.notifier.is_empty());
}

#[test]
fn test_title_used_when_identifier_missing() {
    let h = Harness::new(ProductStates::default());
    let (_normal, discovery) = groups(&h, 10);
    discovery.add_keyword("+air max").unwrap();

    let mut product = snapshot("AM1", true, &[], "100");
    product.title = "Nike Air-Max 90".into();
    discovery.handle_promoted_products(&[product]);
    assert_eq!(h.notifier.len(), 1);
}

#[test]
fn test_add_remove_sku_updates_rotation_and_state() {
    let h = Harness::new(ProductStates::default());
    let (normal, _discovery) = groups(&h, 10);

    normal.add_sku(&SkuQuery::new("a1")).unwrap();
    assert!(matches!(
        normal.add_sku(&SkuQuery::new("A1")),
        Err(MonitorError::AlreadyIncluded { .. })
    ));
    assert_eq!(normal.list_skus(), vec!["A1"]);
    assert!(normal.is_monitored(&SkuQuery::new("A1")));

    normal.remove_sku(&SkuQuery::new("A1")).unwrap();
    assert!(normal.list_skus().is_empty());
    h.ctx.persist.flush();
    assert!(h.store.current().normal.sku_queries.is_empty());
}

#[test]
fn test_removed_sku_stays_removed_under_running_cycles() {
    let h = Harness::new(ProductStates::default());
    let (normal, _discovery) = groups(&h, 10);
    let a = SkuQuery::new("A");

    for round in 0..500 {
        normal.add_sku(&a).unwrap();
        let cycle = {
            let normal = Arc::clone(&normal);
            thread::spawn(move || {
                for _ in 0..20 {
                    normal.handle_products(&skus(&["A"]), vec![snapshot("A", true, &["40"], "100")]);
                }
            })
        };
        normal.remove_sku(&a).unwrap();
        cycle.join().unwrap();

        assert!(!normal.is_monitored(&a));
        let states = h.ctx.states.normal();
        assert!(states.get(&a).is_none(), "record recreated in round {round}");
        assert!(!states.contains(&a), "sku monitored again in round {round}");
    }
    assert!(normal.list_skus().is_empty());
}

#[test]
fn test_loaded_keywords_are_normalized() {
    let mut states = ProductStates::default();
    states.discovery.keyword_queries = vec!["+Jordan  Retro".into(), "+jordan retro".into()];
    let h = Harness::new(states);
    let (_normal, discovery) = groups(&h, 10);

    assert_eq!(discovery.list_keywords(), vec!["+jordan retro"]);
    assert!(matches!(
        discovery.add_keyword("+jordan retro"),
        Err(MonitorError::AlreadyIncluded { .. })
    ));

    discovery.remove_keyword("+jordan retro").unwrap();
    assert!(discovery.list_keywords().is_empty());
    h.ctx.persist.flush();
    assert!(h.store.current().discovery.keyword_queries.is_empty());
}

#[test]
fn test_record_only_skus_are_listed_on_load() {
    let mut states = ProductStates::default();
    states.normal.product_states.push(PersistedProductState::unloaded("OLD1"));
    let h = Harness::new(states);
    let (normal, _discovery) = groups(&h, 10);

    assert_eq!(normal.list_skus(), vec!["OLD1"]);
    assert!(h.ctx.states.normal().is_listed(&SkuQuery::new("OLD1")));
    normal.remove_sku(&SkuQuery::new("OLD1")).unwrap();
    assert!(!h.ctx.states.normal().contains(&SkuQuery::new("OLD1")));
}
