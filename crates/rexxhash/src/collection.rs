// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! The policy layer (§4.2): grows the backing [`Contents`] on demand and
//! exposes the domain-level operations callers actually use.

use std::hash::Hash;

use crate::contents::{Contents, calculate_bucket_size};
use crate::iter::{ForwardIter, ForwardIterMut, IndexIter, ReverseIter};
use crate::keys::StringFold;
use crate::supplier::Supplier;

/// Error surfaced by the hash engine (§7). `NotFound` is never an error
/// value here -- misses are represented as `None`, matching the engine's
/// own "never fail" contract for `get`/`remove`/`hasIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashError {
    InvalidArgument,
}

/// Owns exactly one [`Contents`], replacing it atomically whenever
/// expansion is needed.
#[derive(Debug, Clone)]
pub struct Collection<K, V> {
    contents: Contents<K, V>,
}

impl<K: Hash + Eq + Clone, V: Clone> Collection<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0, false)
    }

    /// Creates a MultiValue collection, where `put` behaves as `addFront`
    /// (§4.1 variant table).
    #[must_use]
    pub fn new_multi_value() -> Self {
        Self::with_capacity(0, true)
    }

    #[must_use]
    pub fn with_capacity(requested: usize, multi_value: bool) -> Self {
        Self {
            contents: Contents::new(requested, multi_value),
        }
    }

    /// Grows the backing table before a caller-driven mutation if it is
    /// full (§4.2 "checkFull").
    fn check_full(&mut self) {
        if self.contents.is_full() {
            let new_size = calculate_bucket_size(self.contents.bucket_size() * 2);
            self.contents = self.contents.re_merge(new_size);
        }
    }

    /// Preallocates so that `delta` subsequent insertions cause at most
    /// one growth.
    pub fn ensure_capacity(&mut self, delta: usize) {
        while !self.contents.has_capacity(delta) {
            let new_size = calculate_bucket_size(self.contents.bucket_size() * 2);
            self.contents = self.contents.re_merge(new_size);
        }
    }

    pub fn put(&mut self, value: V, index: K) {
        self.check_full();
        self.contents.put(value, index);
    }

    pub fn add(&mut self, value: V, index: K) {
        self.check_full();
        self.contents.add(value, index);
    }

    pub fn add_front(&mut self, value: V, index: K) {
        self.check_full();
        self.contents.add_front(value, index);
    }

    #[must_use]
    pub fn get(&self, index: &K) -> Option<&V> {
        self.contents.get(index)
    }

    #[must_use]
    pub fn has_index(&self, index: &K) -> bool {
        self.contents.get(index).is_some()
    }

    #[must_use]
    pub fn has_item(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.all_items().any(|v| v == value)
    }

    /// Returns any index currently mapped to `value`.
    #[must_use]
    pub fn get_index(&self, value: &V) -> Option<&K>
    where
        V: PartialEq,
    {
        self.contents
            .entries()
            .iter()
            .find(|e| e.value.as_ref() == Some(value))
            .and_then(|e| e.index.as_ref())
    }

    pub fn remove(&mut self, index: &K) -> Option<V> {
        self.contents.remove(index)
    }

    pub fn remove_item(&mut self, value: &V, index: Option<&K>) -> bool
    where
        V: PartialEq,
    {
        self.contents.remove_item(value, index)
    }

    #[must_use]
    pub fn items(&self) -> usize {
        self.contents.item_count()
    }

    pub fn empty(&mut self) {
        self.contents.clear();
    }

    #[must_use]
    pub fn all_items(&self) -> impl Iterator<Item = &V> {
        self.contents.entries().iter().filter_map(|e| e.value.as_ref())
    }

    #[must_use]
    pub fn all_indexes(&self) -> impl Iterator<Item = &K> {
        self.contents.entries().iter().filter_map(|e| e.index.as_ref())
    }

    /// Every distinct index, each reported once regardless of how many
    /// values it maps to under MultiValue semantics.
    #[must_use]
    pub fn unique_indexes(&self) -> Vec<&K> {
        let mut seen: Vec<&K> = Vec::new();
        for index in self.all_indexes() {
            if !seen.contains(&index) {
                seen.push(index);
            }
        }
        seen
    }

    #[must_use]
    pub fn iterator(&self) -> ForwardIter<'_, K, V> {
        ForwardIter::new(&self.contents)
    }

    /// Like [`Collection::iterator`], but also supports `replace` and
    /// `remove_current` on the entry currently visited (§4.3).
    #[must_use]
    pub fn iterator_mut(&mut self) -> ForwardIterMut<'_, K, V> {
        ForwardIterMut::new(&mut self.contents)
    }

    #[must_use]
    pub fn reverse_iterator(&self) -> ReverseIter<'_, K, V> {
        ReverseIter::new(&self.contents)
    }

    #[must_use]
    pub fn iterator_at(&self, index: &K) -> IndexIter<'_, K, V> {
        IndexIter::new(&self.contents, index.clone())
    }

    #[must_use]
    pub fn supplier(&self) -> Supplier<K, V> {
        Supplier::from_collection(&self.contents)
    }

    #[must_use]
    pub fn supplier_at(&self, index: &K) -> Supplier<K, V> {
        Supplier::from_index(&self.contents, index)
    }

    /// Adds every entry of `self` into `target` that `target` does not
    /// already have an index for.
    pub fn merge(&self, target: &mut Self) {
        self.contents.merge(&mut target.contents);
    }

    /// Adds every entry of `self` into `target`, overwriting matches.
    pub fn put_all(&self, target: &mut Self) {
        self.contents.put_all(&mut target.contents);
    }

    /// Deep-copies every stored value via `V::clone`, keeping the same
    /// indexes.
    #[must_use]
    pub fn copy_values(&self) -> Self {
        let mut copy = Self::with_capacity(self.contents.bucket_size(), false);
        for entry in self.contents.entries() {
            if let (Some(index), Some(value)) = (&entry.index, &entry.value) {
                copy.add(value.clone(), index.clone());
            }
        }
        copy
    }

    /// Whether a deserialized instance of this collection must be handed
    /// to the host's rehash-pending table before further use. Plain
    /// collections rehash on load since key hashes are not guaranteed
    /// stable across serialization boundaries.
    #[must_use]
    pub const fn requires_rehash(&self) -> bool {
        true
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for Collection<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A `Collection<StringFold, V>` with the uppercased-entry convenience
/// API (§4.2 "StringMap additions"). Its byte-keyed hash is stable across
/// serialization, so [`Collection::requires_rehash`] would be `false` for
/// it if the engine tracked the distinction per-instance; `StringMap`
/// reports it directly.
#[derive(Debug, Clone, Default)]
pub struct StringMap<V: Clone>(Collection<StringFold, V>);

impl<V: Clone> StringMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self(Collection::new())
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&V> {
        self.0.get(&StringFold::new(name))
    }

    #[must_use]
    pub fn has_entry(&self, name: &str) -> bool {
        self.0.has_index(&StringFold::new(name))
    }

    /// Sets `name`'s entry to `value`, or removes it when `value` is
    /// `None` (§4.2: "setEntry(name, absent) is equivalent to
    /// removeEntry(name)").
    pub fn set_entry(&mut self, name: &str, value: Option<V>) {
        match value {
            Some(v) => self.0.put(v, StringFold::new(name)),
            None => {
                self.remove_entry(name);
            }
        }
    }

    pub fn remove_entry(&mut self, name: &str) -> Option<V> {
        self.0.remove(&StringFold::new(name))
    }

    #[must_use]
    pub const fn requires_rehash() -> bool {
        false
    }

    #[must_use]
    pub fn items(&self) -> usize {
        self.0.items()
    }

    #[must_use]
    pub fn inner(&self) -> &Collection<StringFold, V> {
        &self.0
    }
}

/// A `Collection<V, V>` where the value and index are always the same
/// entity (§4.2 "IndexOnlySet policy").
#[derive(Debug, Clone, Default)]
pub struct IndexOnlySet<V: Hash + Eq + Clone>(Collection<V, V>);

impl<V: Hash + Eq + Clone> IndexOnlySet<V> {
    #[must_use]
    pub fn new() -> Self {
        Self(Collection::new())
    }

    /// Inserts `(value, index)`, as the general `Collection::put` contract
    /// requires, but only ever stores `value` under itself: `index` must
    /// equal `value` or this fails with [`HashError::InvalidArgument`]
    /// (§4.2, §7) rather than silently storing a mismatched pair.
    pub fn put(&mut self, value: V, index: V) -> Result<(), HashError>
    where
        V: PartialEq,
    {
        if value != index {
            return Err(HashError::InvalidArgument);
        }
        self.0.put(value.clone(), index);
        Ok(())
    }

    #[must_use]
    pub fn has_item(&self, v: &V) -> bool
    where
        V: PartialEq,
    {
        self.0.has_index(v)
    }

    #[must_use]
    pub fn get_index<'a>(&'a self, v: &V) -> Option<&'a V> {
        self.0.get(v)
    }

    pub fn remove(&mut self, v: &V) -> Option<V> {
        self.0.remove(v)
    }

    #[must_use]
    pub fn items(&self) -> usize {
        self.0.items()
    }
}

#[cfg(test)]
#[path = "collection_test.rs"]
mod collection_test;
