use super::*;
use crate::proto::Item;

fn basic(gid: i64, level: i64, gold: i64, exp: i64) -> BasicInfo {
    BasicInfo { gid, name: "farmer".to_owned(), level, exp, gold }
}

fn item_change(id: i64, count: i64) -> ItemChange {
    ItemChange { item: Some(Item { id, count }), delta: 0 }
}

#[test]
fn new_store_is_empty() {
    let store = SessionStore::new();
    let state = store.snapshot();
    assert_eq!(state, SessionState::default());
    assert!(!state.is_logged_in());
}

#[test]
fn apply_login_fills_identity_and_resources() {
    let store = SessionStore::new();
    let reply = LoginReply { basic: Some(basic(42, 5, 1000, 77)), time_now_millis: 0 };

    let state = store.apply_login(&reply);
    assert_eq!(state.gid, 42);
    assert_eq!(state.name, "farmer");
    assert_eq!(state.level, 5);
    assert_eq!(state.gold, 1000);
    assert_eq!(state.exp, 77);
    assert!(state.is_logged_in());
    assert_eq!(store.snapshot(), state);
}

#[test]
fn apply_login_syncs_server_clock() {
    let store = SessionStore::new();
    let server_ms = now_ms() + 60_000;
    let state = store.apply_login(&LoginReply { basic: None, time_now_millis: server_ms });

    let offset = state.server_time_offset_ms;
    assert!((59_000..=60_000).contains(&offset), "offset {offset}");
    let projected = state.server_now_ms();
    assert!((projected - server_ms).abs() < 1_000);
    assert!((state.server_now_secs() - server_ms / 1_000).abs() <= 1);
}

#[test]
fn apply_basic_treats_zero_as_unchanged() {
    let store = SessionStore::new();
    store.apply_login(&LoginReply { basic: Some(basic(42, 5, 1000, 77)), time_now_millis: 0 });

    store.apply_basic(&BasicInfo { gid: 0, name: String::new(), level: 6, exp: 0, gold: 0 });
    let state = store.snapshot();
    assert_eq!(state.level, 6);
    assert_eq!(state.gold, 1000);
    assert_eq!(state.exp, 77);
    assert_eq!(state.name, "farmer");
}

#[test]
fn gold_and_exp_reach_zero_through_items_and_totals() {
    let store = SessionStore::new();
    store.apply_login(&LoginReply { basic: Some(basic(42, 5, 1000, 77)), time_now_millis: 0 });

    store.apply_items(&[item_change(1001, 0)]);
    assert_eq!(store.snapshot().gold, 0);

    store.apply_totals(ResourceTotals { gold: None, exp: Some(0), level: None });
    let state = store.snapshot();
    assert_eq!((state.gold, state.exp, state.level), (0, 0, 5));
}

#[test]
fn apply_items_routes_gold_and_exp_ids() {
    let store = SessionStore::new();
    store.apply_items(&[item_change(1001, 2500), item_change(1101, 300), item_change(20001, 9)]);
    let state = store.snapshot();
    assert_eq!(state.gold, 2500);
    assert_eq!(state.exp, 300);

    store.apply_items(&[item_change(1, 2600), ItemChange { item: None, delta: 4 }]);
    assert_eq!(store.snapshot().gold, 2600);
}

#[test]
fn apply_totals_overwrites_only_present_fields() {
    let store = SessionStore::new();
    store.apply_login(&LoginReply { basic: Some(basic(1, 2, 3, 4)), time_now_millis: 0 });
    store.apply_totals(ResourceTotals { gold: Some(50), exp: None, level: None });
    let state = store.snapshot();
    assert_eq!(state.gold, 50);
    assert_eq!(state.exp, 4);
    assert_eq!(state.level, 2);
}

#[test]
fn sync_server_time_ignores_non_positive_values() {
    let store = SessionStore::new();
    store.sync_server_time(0);
    assert_eq!(store.snapshot().server_time_offset_ms, 0);
}

#[test]
fn to_time_secs_normalizes_milliseconds() {
    assert_eq!(to_time_secs(-1), 0);
    assert_eq!(to_time_secs(0), 0);
    assert_eq!(to_time_secs(1_700_000_000), 1_700_000_000);
    assert_eq!(to_time_secs(1_700_000_000_123), 1_700_000_000);
}
