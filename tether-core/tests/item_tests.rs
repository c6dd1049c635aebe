//! Canonical item and diff record behaviour.
//!
//! Each `#[case]` is isolated: no shared state.

use rstest::rstest;
use serde_json::json;

use tether_core::{DiffResult, Direction, Item, LineSpan, LocalRef, SyncKey};

#[rstest]
#[case::up("up", Direction::Up)]
#[case::down("down", Direction::Down)]
#[case::mixed_case("Down", Direction::Down)]
fn direction_parses(#[case] input: &str, #[case] expected: Direction) {
    assert_eq!(input.parse::<Direction>().unwrap(), expected);
}

#[rstest]
#[case::whole_file(LocalRef::file("modules/a.lua"), "modules/a.lua")]
#[case::first_block(LocalRef::block("routes/r.lua", LineSpan::new(0, 4)), "routes/r.lua#L0-4")]
#[case::later_block(LocalRef::block("routes/r.lua", LineSpan::new(4, 12)), "routes/r.lua#L4-12")]
fn cache_keys(#[case] local: LocalRef, #[case] expected: &str) {
    let item = Item::new().with_local(local);
    assert_eq!(item.cache_key().as_deref(), Some(expected));
}

#[test]
fn item_json_roundtrip_keeps_remote_metadata() {
    let mut item = Item::new()
        .with_field("method", "GET")
        .with_field("allowed", json!(["on", "off"]));
    item.remote_id = Some("r-1".into());
    item.updated_at = Some(chrono::Utc::now());

    let json = serde_json::to_value(&item).expect("serialize");
    let back: Item = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, item);
}

#[test]
fn diff_result_serializes_keys_as_strings() {
    let diff = DiffResult {
        toadd: vec![SyncKey::from("GET /a")],
        ..Default::default()
    };
    let json = serde_json::to_value(&diff).expect("serialize");
    assert_eq!(json["toadd"], json!(["GET /a"]));
    assert_eq!(json["unchg"], json!([]));
}

#[test]
fn line_span_len() {
    assert_eq!(LineSpan::new(2, 7).len(), 5);
    assert!(LineSpan::new(3, 3).is_empty());
}
