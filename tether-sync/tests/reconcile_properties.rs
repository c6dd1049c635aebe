use std::collections::HashSet;

use rstest::rstest;
use tether_core::{DiffResult, Direction, Item, SyncKey};
use tether_sync::{
    reconcile,
    types::{Endpoints, EventHandlers, Modules},
    CompareContext, MatchPattern, ReconcileOptions, Side, SyncError,
};

fn module(name: &str, script: &str) -> Item {
    Item::new()
        .with_field("name", name)
        .with_field("script", script)
}

fn modules(names: &[&str]) -> Vec<Item> {
    names.iter().map(|n| module(n, "return 1")).collect()
}

fn keys(keys: &[SyncKey]) -> Vec<&str> {
    keys.iter().map(SyncKey::as_str).collect()
}

fn run(
    local: &[Item],
    remote: &[Item],
    direction: Direction,
    delete: bool,
    pattern: Option<&MatchPattern>,
) -> DiffResult {
    let opts = ReconcileOptions {
        direction,
        delete,
        pattern,
    };
    reconcile(
        &Modules,
        local,
        remote,
        &opts,
        &mut CompareContext::new(direction, Default::default()),
    )
    .expect("reconcile")
}

#[test]
fn scenario_a_everything_local_is_added() {
    let diff = run(&modules(&["a", "b", "c"]), &[], Direction::Up, false, None);
    assert_eq!(keys(&diff.toadd), ["a", "b", "c"]);
    assert!(diff.todel.is_empty());
    assert!(diff.tomod.is_empty());
    assert!(diff.unchg.is_empty());
}

#[test]
fn scenario_b_remote_only_key_deleted_on_request() {
    let diff = run(
        &modules(&["a", "b"]),
        &modules(&["a", "b", "c"]),
        Direction::Up,
        true,
        None,
    );
    assert!(diff.toadd.is_empty());
    assert_eq!(keys(&diff.todel), ["c"]);
    assert!(diff.tomod.is_empty());
    assert_eq!(keys(&diff.unchg), ["a", "b"]);
}

#[test]
fn scenario_c_content_difference_is_a_modification() {
    let diff = run(
        &[module("a", "return 'new'")],
        &[module("a", "return 'old'")],
        Direction::Up,
        false,
        None,
    );
    assert_eq!(keys(&diff.tomod), ["a"]);
    assert!(diff.unchg.is_empty());
}

#[test]
fn scenario_d_pattern_excluded_key_is_nowhere() {
    let pattern = MatchPattern::parse("a").expect("pattern");
    let local = vec![module("a", "return 1"), module("b", "return 'local'")];
    let remote = vec![module("a", "return 1"), module("b", "return 'remote'")];
    for direction in [Direction::Up, Direction::Down] {
        let diff = run(&local, &remote, direction, true, Some(&pattern));
        let b = SyncKey::from("b");
        assert_eq!(diff.classification(&b), None);
        assert_eq!(keys(&diff.unchg), ["a"]);
    }
}

#[test]
fn deletes_need_explicit_opt_in() {
    let diff = run(&[], &modules(&["x", "y"]), Direction::Up, false, None);
    assert!(diff.todel.is_empty());
    let diff = run(&modules(&["x", "y"]), &[], Direction::Down, false, None);
    assert!(diff.todel.is_empty());
}

#[rstest]
#[case::up_no_delete(Direction::Up, false)]
#[case::up_delete(Direction::Up, true)]
#[case::down_no_delete(Direction::Down, false)]
#[case::down_delete(Direction::Down, true)]
fn classifications_are_disjoint_and_cover_the_universe(
    #[case] direction: Direction,
    #[case] delete: bool,
) {
    let local = vec![
        module("shared_same", "return 1"),
        module("shared_diff", "return 'local'"),
        module("local_only", "return 1"),
    ];
    let remote = vec![
        module("remote_only", "return 1"),
        module("shared_diff", "return 'remote'"),
        module("shared_same", "return 1"),
    ];
    let diff = run(&local, &remote, direction, delete, None);

    let groups = [&diff.toadd, &diff.todel, &diff.tomod, &diff.unchg];
    let mut seen = HashSet::new();
    for group in groups {
        for key in group {
            assert!(seen.insert(key.clone()), "{key} classified twice");
        }
    }

    let target_only = match direction {
        Direction::Up => "remote_only",
        Direction::Down => "local_only",
    };
    let mut universe: HashSet<SyncKey> = ["shared_same", "shared_diff", "local_only", "remote_only"]
        .into_iter()
        .map(SyncKey::from)
        .collect();
    if !delete {
        universe.remove(&SyncKey::from(target_only));
    }
    assert_eq!(seen, universe);
}

#[test]
fn repeated_runs_classify_in_identical_order() {
    let local = modules(&["m3", "m1", "m2", "m9"]);
    let remote = modules(&["m2", "m8", "m3"]);
    let first = run(&local, &remote, Direction::Up, true, None);
    for _ in 0..5 {
        assert_eq!(run(&local, &remote, Direction::Up, true, None), first);
    }
    assert_eq!(keys(&first.toadd), ["m1", "m9"]);
    assert_eq!(keys(&first.unchg), ["m3", "m2"]);
    assert_eq!(keys(&first.todel), ["m8"]);
}

#[test]
fn duplicate_remote_key_fails_fast() {
    let remote = vec![module("a", "return 1"), module("a", "return 2")];
    let err = reconcile(
        &Modules,
        &[],
        &remote,
        &ReconcileOptions::default(),
        &mut CompareContext::default(),
    )
    .unwrap_err();
    match err {
        SyncError::DuplicateKey { kind, key, side } => {
            assert_eq!(kind, "modules");
            assert_eq!(key, SyncKey::from("a"));
            assert_eq!(side, Side::Remote);
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
}

#[test]
fn item_without_key_field_is_reported() {
    let err = reconcile(
        &Modules,
        &[Item::new().with_field("script", "return 1")],
        &[],
        &ReconcileOptions::default(),
        &mut CompareContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::MissingField { field: "name", .. }));
}

#[test]
fn only_endpoint_methods_match_case_insensitively() {
    fn opts(pattern: &MatchPattern) -> ReconcileOptions<'_> {
        ReconcileOptions {
            direction: Direction::Up,
            delete: false,
            pattern: Some(pattern),
        }
    }

    let endpoint = Item::new()
        .with_field("method", "GET")
        .with_field("path", "/users")
        .with_field("script", "return 1");
    let lower_method = MatchPattern::parse("#get#/users").unwrap();
    let diff = reconcile(
        &Endpoints::default(),
        &[endpoint],
        &[],
        &opts(&lower_method),
        &mut CompareContext::new(Direction::Up, Default::default()),
    )
    .unwrap();
    assert_eq!(keys(&diff.toadd), ["GET /users"]);

    let handler = Item::new()
        .with_field("service", "device2")
        .with_field("event", "event")
        .with_field("script", "return 1");
    let upper_service = MatchPattern::parse("#DEVICE2#*").unwrap();
    let diff = reconcile(
        &EventHandlers::default(),
        &[handler],
        &[],
        &opts(&upper_service),
        &mut CompareContext::new(Direction::Up, Default::default()),
    )
    .unwrap();
    assert_eq!(diff.len(), 0);
}
