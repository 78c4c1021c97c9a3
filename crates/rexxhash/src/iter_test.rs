// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use crate::contents::Contents;

#[test]
fn forward_iter_visits_every_entry_exactly_once() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    for i in 0..20 {
        c.add("v", i);
    }
    let mut seen: Vec<i32> = ForwardIter::new(&c).map(|(k, _)| *k).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[test]
fn forward_iter_preserves_chain_order_within_a_bucket() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);
    c.add("c", 1);
    let chain: Vec<&str> = ForwardIter::new(&c)
        .filter(|(k, _)| **k == 1)
        .map(|(_, v)| *v)
        .collect();
    assert_eq!(chain, vec!["a", "b", "c"]);
}

#[test]
fn reverse_iter_visits_the_same_multiset_as_forward() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    for i in 0..15 {
        c.add("v", i);
    }
    let mut forward: Vec<i32> = ForwardIter::new(&c).map(|(k, _)| *k).collect();
    let mut reverse: Vec<i32> = ReverseIter::new(&c).map(|(k, _)| *k).collect();
    forward.sort_unstable();
    reverse.sort_unstable();
    assert_eq!(forward, reverse);
}

#[test]
fn index_iter_only_yields_entries_for_the_requested_key() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 2);
    c.add("c", 1);
    let values: Vec<&str> = IndexIter::new(&c, 1).map(|v| *v).collect();
    assert_eq!(values, vec!["a", "c"]);
}

#[test]
fn index_iter_on_an_absent_key_yields_nothing() {
    let c: Contents<i32, &str> = Contents::new(0, false);
    assert_eq!(IndexIter::new(&c, 7).count(), 0);
}

#[test]
fn forward_iter_mut_replace_overwrites_value_in_place() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);

    let mut it = ForwardIterMut::new(&mut c);
    assert!(it.available());
    it.replace("z");
    drop(it);

    assert_eq!(c.get(&1), Some(&"z"));
}

#[test]
fn forward_iter_mut_remove_current_past_anchor_unlinks_without_disturbing_others() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);
    c.add("c", 1);

    let mut it = ForwardIterMut::new(&mut c);
    it.advance();
    assert_eq!(it.value(), Some(&"b"));
    it.remove_current();
    assert_eq!(it.value(), Some(&"c"));
    drop(it);

    let remaining: Vec<&str> = ForwardIter::new(&c).filter(|(k, _)| **k == 1).map(|(_, v)| *v).collect();
    assert_eq!(remaining, vec!["a", "c"]);
    assert_eq!(c.item_count(), 2);
}

#[test]
fn forward_iter_mut_remove_current_at_anchor_with_successor_promotes_it() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);

    let mut it = ForwardIterMut::new(&mut c);
    assert_eq!(it.value(), Some(&"a"));
    it.remove_current();
    assert_eq!(it.value(), Some(&"b"));
    drop(it);

    assert_eq!(c.get(&1), Some(&"b"));
    assert_eq!(c.item_count(), 1);
}

#[test]
fn forward_iter_mut_remove_current_drains_a_singleton_table() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("solo", 1);

    let mut it = ForwardIterMut::new(&mut c);
    assert!(it.available());
    it.remove_current();
    assert!(!it.available());
    drop(it);

    assert_eq!(c.item_count(), 0);
    assert_eq!(c.get(&1), None);
}
