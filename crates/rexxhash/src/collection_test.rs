// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;

#[test]
fn ensure_capacity_prevents_expansion_for_the_reserved_count() {
    let mut c: Collection<i32, i32> = Collection::with_capacity(0, false);
    let before = c.contents.bucket_size();
    c.ensure_capacity(100);
    let after = c.contents.bucket_size();
    assert!(after >= before);
    for i in 0..100 {
        c.put(i, i);
    }
    assert_eq!(c.contents.bucket_size(), after, "100 adds within the reserved capacity must not trigger growth");
}

#[test]
fn checkfull_expansion_preserves_all_items() {
    let mut c: Collection<i32, i32> = Collection::new();
    for i in 0..200 {
        c.add(i, i);
    }
    assert_eq!(c.items(), 200);
    for i in 0..200 {
        assert_eq!(c.get(&i), Some(&i));
    }
}

#[test]
fn multi_value_put_is_add_front_and_keeps_every_value() {
    let mut c: Collection<i32, &str> = Collection::new_multi_value();
    c.put("old", 1);
    c.put("new", 1);
    assert_eq!(c.get(&1), Some(&"new"));
    assert_eq!(c.items(), 2);
}

#[test]
fn get_index_finds_any_index_mapped_to_a_value() {
    let mut c: Collection<i32, &str> = Collection::new();
    c.put("x", 5);
    assert_eq!(c.get_index(&"x"), Some(&5));
    assert_eq!(c.get_index(&"absent"), None);
}

#[test]
fn unique_indexes_reports_each_index_once_under_multivalue() {
    let mut c: Collection<i32, &str> = Collection::new_multi_value();
    c.put("a", 1);
    c.put("b", 1);
    c.put("c", 2);
    let mut unique: Vec<i32> = c.unique_indexes().into_iter().copied().collect();
    unique.sort_unstable();
    assert_eq!(unique, vec![1, 2]);
}

#[test]
fn merge_is_add_if_absent_put_all_overwrites() {
    let mut target: Collection<i32, &str> = Collection::new();
    target.put("kept", 1);
    let mut source: Collection<i32, &str> = Collection::new();
    source.put("ignored-by-merge", 1);
    source.put("added", 2);
    source.merge(&mut target);
    assert_eq!(target.get(&1), Some(&"kept"));
    assert_eq!(target.get(&2), Some(&"added"));

    source.put_all(&mut target);
    assert_eq!(target.get(&1), Some(&"ignored-by-merge"));
}

#[test]
fn copy_values_produces_an_independent_collection() {
    let mut original: Collection<i32, String> = Collection::new();
    original.put("a".to_string(), 1);
    let mut copy = original.copy_values();
    copy.put("b".to_string(), 1);
    assert_eq!(original.get(&1), Some(&"a".to_string()));
    assert_eq!(copy.get(&1), Some(&"b".to_string()));
}

#[test]
fn string_map_entries_are_case_insensitive() {
    let mut m: StringMap<i32> = StringMap::new();
    m.set_entry("Color", Some(1));
    assert_eq!(m.entry("COLOR"), Some(&1));
    assert!(m.has_entry("color"));
}

#[test]
fn string_map_set_entry_absent_removes() {
    let mut m: StringMap<i32> = StringMap::new();
    m.set_entry("Color", Some(1));
    m.set_entry("Color", None);
    assert!(!m.has_entry("color"));
    assert_eq!(m.items(), 0);
}

#[test]
fn index_only_set_put_has_item_and_remove() {
    let mut s: IndexOnlySet<i32> = IndexOnlySet::new();
    assert_eq!(s.put(7, 7), Ok(()));
    assert!(s.has_item(&7));
    assert_eq!(s.get_index(&7), Some(&7));
    s.remove(&7);
    assert!(!s.has_item(&7));
}

#[test]
fn index_only_set_put_rejects_a_mismatched_value_and_index() {
    let mut s: IndexOnlySet<i32> = IndexOnlySet::new();
    assert_eq!(s.put(7, 8), Err(HashError::InvalidArgument));
    assert!(!s.has_item(&7));
    assert!(!s.has_item(&8));
}
