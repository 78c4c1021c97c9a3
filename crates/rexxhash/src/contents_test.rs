// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use proptest::prelude::*;

#[test]
fn calculate_bucket_size_rounds_up_to_odd_and_respects_floor() {
    assert_eq!(calculate_bucket_size(0), MINIMUM_BUCKET_SIZE);
    assert_eq!(calculate_bucket_size(10), MINIMUM_BUCKET_SIZE);
    assert_eq!(calculate_bucket_size(18), 19);
    assert_eq!(calculate_bucket_size(19), 19);
}

#[test]
fn put_then_get_returns_the_most_recent_value() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.put("first", 1);
    assert_eq!(c.get(&1), Some(&"first"));
    c.put("second", 1);
    assert_eq!(c.get(&1), Some(&"second"));
    assert_eq!(c.item_count(), 1);
}

#[test]
fn get_after_remove_is_absent() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.put("x", 5);
    assert_eq!(c.remove(&5), Some("x"));
    assert_eq!(c.get(&5), None);
    assert_eq!(c.item_count(), 0);
}

#[test]
fn add_preserves_insertion_order_for_equal_keys() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);
    c.add("c", 1);
    assert_eq!(c.get_all(&1), vec![&"a", &"b", &"c"]);
}

#[test]
fn add_front_shadows_older_entries_for_get() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("old", 1);
    c.add_front("new", 1);
    assert_eq!(c.get(&1), Some(&"new"));
    assert_eq!(c.get_all(&1), vec![&"new", &"old"]);
}

#[test]
fn multi_value_put_behaves_as_add_front() {
    let mut c: Contents<i32, &str> = Contents::new(0, true);
    c.put("old", 1);
    c.put("new", 1);
    assert_eq!(c.get(&1), Some(&"new"));
    assert_eq!(c.get_all(&1), vec![&"new", &"old"]);
    assert_eq!(c.item_count(), 2);
}

#[test]
fn remove_at_anchor_with_successor_promotes_successor_into_anchor() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);
    c.remove(&1);
    // "b" must still be reachable even though "a" occupied the anchor.
    assert_eq!(c.get_all(&1), vec![&"b"]);
}

#[test]
fn remove_item_finds_by_value_across_buckets() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.put("x", 1);
    c.put("x", 2);
    assert!(c.remove_item(&"x", Some(&1)));
    assert_eq!(c.get(&1), None);
    assert_eq!(c.get(&2), Some(&"x"));
}

#[test]
fn merge_does_not_overwrite_target_entries() {
    let mut target: Contents<i32, &str> = Contents::new(0, false);
    target.put("kept", 1);
    let mut source: Contents<i32, &str> = Contents::new(0, false);
    source.put("ignored", 1);
    source.put("added", 2);

    source.merge(&mut target);
    assert_eq!(target.get(&1), Some(&"kept"));
    assert_eq!(target.get(&2), Some(&"added"));
}

#[test]
fn put_all_overwrites_target_entries() {
    let mut target: Contents<i32, &str> = Contents::new(0, false);
    target.put("old", 1);
    let mut source: Contents<i32, &str> = Contents::new(0, false);
    source.put("new", 1);

    source.put_all(&mut target);
    assert_eq!(target.get(&1), Some(&"new"));
}

#[test]
fn re_merge_preserves_all_items_and_order() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    for i in 0..10 {
        c.add("v", i);
    }
    let grown = c.re_merge(calculate_bucket_size(c.bucket_size() * 2));
    assert_eq!(grown.item_count(), c.item_count());
    for i in 0..10 {
        assert_eq!(grown.get(&i), Some(&"v"));
    }
}

#[test]
fn clear_empties_every_chain_and_resets_free_list() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    for i in 0..20 {
        c.add("v", i);
    }
    c.clear();
    assert_eq!(c.item_count(), 0);
    assert!(!c.is_full());
    for i in 0..20 {
        assert_eq!(c.get(&i), None);
    }
}

proptest! {
    #[test]
    fn put_get_remove_quantified_invariant(ops in proptest::collection::vec((0i32..50, any::<bool>()), 1..200)) {
        let mut c: Contents<i32, i32> = Contents::new(64, false);
        let mut model: std::collections::HashMap<i32, i32> = std::collections::HashMap::new();
        for (key, is_put) in ops {
            if c.is_full() {
                let grown = c.re_merge(calculate_bucket_size(c.bucket_size() * 2));
                c = grown;
            }
            if is_put {
                c.put(key, key);
                model.insert(key, key);
            } else {
                let got = c.remove(&key);
                let expected = model.remove(&key);
                prop_assert_eq!(got, expected);
            }
            prop_assert_eq!(c.get(&key).copied(), model.get(&key).copied());
        }
    }

    #[test]
    fn item_count_always_matches_the_number_of_occupied_cells(
        keys in proptest::collection::vec(0i32..30, 1..100)
    ) {
        let mut c: Contents<i32, i32> = Contents::new(17, false);
        for k in &keys {
            if c.is_full() {
                c = c.re_merge(calculate_bucket_size(c.bucket_size() * 2));
            }
            c.add(*k, *k);
            c.remove(&(k + 1000));
            let occupied = c.entries().iter().filter(|e| !e.is_available()).count();
            prop_assert_eq!(occupied, c.item_count());
        }
    }
}
