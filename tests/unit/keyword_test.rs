//! Tests for keyword query compilation and matching

use restock_sentinel::core::{build_identifier, KeywordQuery};

#[test]
fn test_scenario_from_listing() {
    let q = KeywordQuery::compile("+jordan -kids /red/blue");
    assert!(q.matches("jordan retro red"));
    assert!(!q.matches("jordan kids red"));
}

#[test]
fn test_every_or_group_must_match() {
    let q = KeywordQuery::compile("/red/blue /low/mid");
    assert!(q.matches("dunk red low"));
    assert!(!q.matches("dunk red high"));
}

#[test]
fn test_exclusive_only_query() {
    let q = KeywordQuery::compile("-gs");
    assert!(q.matches("air force 1"));
    assert!(!q.matches("air force 1 gs"));
}

#[test]
fn test_match_against_built_identifier() {
    let identifier = build_identifier("Nike", "Air Force 1 '07 CW2288-111", "White/White", "CW2288-111");
    assert!(KeywordQuery::compile("+air force -kids /white/black").matches(&identifier));
}

#[test]
fn test_empty_query_matches_everything() {
    assert!(KeywordQuery::compile("   ").matches("anything"));
}
