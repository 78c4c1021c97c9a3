// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use crate::contents::Contents;

#[test]
fn from_collection_snapshots_every_entry() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    for i in 0..10 {
        c.add("v", i);
    }
    let supplier = Supplier::from_collection(&c);
    let mut indexes: Vec<i32> = supplier.map(|(k, _)| k).collect();
    indexes.sort_unstable();
    assert_eq!(indexes, (0..10).collect::<Vec<_>>());
}

#[test]
fn from_collection_is_unaffected_by_later_mutation() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    let mut supplier = Supplier::from_collection(&c);
    c.remove(&1);
    c.add("b", 2);
    assert!(supplier.available());
    assert_eq!(supplier.item(), Some(&"a"));
    supplier.next();
    assert!(!supplier.available());
}

#[test]
fn from_index_only_snapshots_the_requested_chain() {
    let mut c: Contents<i32, &str> = Contents::new(0, false);
    c.add("a", 1);
    c.add("b", 1);
    c.add("c", 2);
    let mut supplier = Supplier::from_index(&c, &1);
    assert_eq!(supplier.item(), Some(&"a"));
    supplier.next();
    assert_eq!(supplier.item(), Some(&"b"));
    supplier.next();
    assert!(!supplier.available());
}
