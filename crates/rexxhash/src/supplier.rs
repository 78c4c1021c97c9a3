// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! A point-in-time snapshot of `(index, value)` pairs, decoupled from the
//! [`Contents`] that produced it so a caller can keep mutating the
//! collection while still walking an older view (§4.4).

use std::hash::Hash;

use crate::contents::Contents;
use crate::entry::NO_MORE;

pub struct Supplier<K, V> {
    pairs: Vec<(K, V)>,
    position: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> Supplier<K, V> {
    /// Snapshots every entry in forward-iteration order (bucket order,
    /// insertion order within a bucket).
    #[must_use]
    pub fn from_collection(contents: &Contents<K, V>) -> Self {
        let mut pairs = Vec::with_capacity(contents.item_count());
        for anchor in 0..contents.bucket_size() {
            if contents.entries()[anchor].is_available() {
                continue;
            }
            let mut cursor = anchor;
            loop {
                let entry = &contents.entries()[cursor];
                if let (Some(index), Some(value)) = (&entry.index, &entry.value) {
                    pairs.push((index.clone(), value.clone()));
                }
                if entry.next == NO_MORE {
                    break;
                }
                cursor = entry.next;
            }
        }
        Self { pairs, position: 0 }
    }

    /// Snapshots every value currently stored under `index`, in insertion
    /// order.
    #[must_use]
    pub fn from_index(contents: &Contents<K, V>, index: &K) -> Self {
        let pairs = contents
            .get_all(index)
            .into_iter()
            .map(|value| (index.clone(), value.clone()))
            .collect();
        Self { pairs, position: 0 }
    }

    #[must_use]
    pub fn available(&self) -> bool {
        self.position < self.pairs.len()
    }

    #[must_use]
    pub fn item(&self) -> Option<&V> {
        self.pairs.get(self.position).map(|(_, v)| v)
    }

    #[must_use]
    pub fn index(&self) -> Option<&K> {
        self.pairs.get(self.position).map(|(k, _)| k)
    }

    pub fn next(&mut self) {
        if self.available() {
            self.position += 1;
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Iterator for Supplier<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.pairs.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        item
    }
}

#[cfg(test)]
mod supplier_test;
