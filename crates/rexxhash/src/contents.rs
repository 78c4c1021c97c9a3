// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Chained open-addressed hash storage (§3, §4.1).
//!
//! `bucketSize` cells serve as hash-addressed anchors; a further
//! `bucketSize` cells form an overflow area threaded onto anchors as
//! collision chains, with unused overflow cells linked into a single free
//! chain. A bucket anchor never moves: when its first chain entry is
//! removed, the successor's fields are copied into the anchor and the
//! successor cell returns to the free chain, so every other chain member
//! keeps its slot.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::entry::{ContentEntry, NO_MORE};

/// Lower bound on `bucketSize`, and the value every fresh `Contents`
/// starts at unless a larger capacity was requested.
pub const MINIMUM_BUCKET_SIZE: usize = 17;

/// Upper bound `calculateBucketSize` will not exceed.
const MAX_BUCKET_SIZE: usize = 1 << 30;

/// Rounds `requested` up to the next odd integer at least
/// `MINIMUM_BUCKET_SIZE`, capped at `MAX_BUCKET_SIZE`.
#[must_use]
pub fn calculate_bucket_size(requested: usize) -> usize {
    let floor = requested.max(MINIMUM_BUCKET_SIZE).min(MAX_BUCKET_SIZE);
    if floor % 2 == 0 { (floor + 1).min(MAX_BUCKET_SIZE) } else { floor }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// The hash table itself: a flat cell array split into an anchor region
/// and an overflow region, plus a free list threading unused overflow
/// cells.
///
/// `put_is_add_front` selects the MultiValue variant's redefinition of
/// `put` as `addFront` (§4.1 variant table); every other behavioral
/// difference between Identity/Equality/StringKey/MultiValue lives in the
/// key type's own `Hash`/`Eq` impl (see [`crate::keys`]), not here.
#[derive(Debug, Clone)]
pub struct Contents<K, V> {
    entries: Vec<ContentEntry<K, V>>,
    bucket_size: usize,
    free_chain: usize,
    item_count: usize,
    put_is_add_front: bool,
}

impl<K: Hash + Eq + Clone, V: Clone> Contents<K, V> {
    /// Creates a fresh, empty table sized for at least `requested_capacity`
    /// live entries.
    #[must_use]
    pub fn new(requested_capacity: usize, put_is_add_front: bool) -> Self {
        let bucket_size = calculate_bucket_size(requested_capacity);
        let total_size = 2 * bucket_size;
        let mut entries = Vec::with_capacity(total_size);
        entries.resize_with(total_size, ContentEntry::empty);

        // Thread the overflow region [bucket_size, total_size) into the
        // free chain, each cell pointing to the next.
        for i in bucket_size..total_size {
            entries[i].next = if i + 1 < total_size { i + 1 } else { NO_MORE };
        }
        let free_chain = if bucket_size < total_size { bucket_size } else { NO_MORE };

        Self {
            entries,
            bucket_size,
            free_chain,
            item_count: 0,
            put_is_add_front,
        }
    }

    #[must_use]
    pub const fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    #[must_use]
    pub fn total_size(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn item_count(&self) -> usize {
        self.item_count
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.free_chain == NO_MORE
    }

    /// Whether `delta` more insertions are guaranteed to fit without
    /// expansion.
    #[must_use]
    pub fn has_capacity(&self, delta: usize) -> bool {
        self.entries.len() - self.item_count > delta
    }

    fn anchor_index(&self, key: &K) -> usize {
        (hash_of(key) % self.bucket_size as u64) as usize
    }

    fn take_free_cell(&mut self) -> usize {
        debug_assert!(!self.is_full(), "put/add/addFront require !isFull()");
        let cell = self.free_chain;
        self.free_chain = self.entries[cell].next;
        cell
    }

    fn return_free_cell(&mut self, cell: usize) {
        self.entries[cell].clear();
        self.entries[cell].next = self.free_chain;
        self.free_chain = cell;
    }

    /// Installs `(value, index)`, overwriting an existing equal-key entry
    /// in place. On the MultiValue variant (`put_is_add_front`), behaves
    /// exactly as [`Contents::add_front`] instead.
    pub fn put(&mut self, value: V, index: K) {
        if self.put_is_add_front {
            self.add_front(value, index);
            return;
        }
        let anchor = self.anchor_index(&index);
        if self.entries[anchor].is_available() {
            self.entries[anchor].index = Some(index);
            self.entries[anchor].value = Some(value);
            self.item_count += 1;
            return;
        }
        let mut cursor = anchor;
        loop {
            if self.entries[cursor].index.as_ref() == Some(&index) {
                self.entries[cursor].value = Some(value);
                return;
            }
            if self.entries[cursor].next == NO_MORE {
                break;
            }
            cursor = self.entries[cursor].next;
        }
        let cell = self.take_free_cell();
        self.entries[cell].index = Some(index);
        self.entries[cell].value = Some(value);
        self.entries[cursor].next = cell;
        self.item_count += 1;
    }

    /// Appends `(value, index)` to the end of its chain, never replacing
    /// an existing match; preserves insertion order among equal keys.
    pub fn add(&mut self, value: V, index: K) {
        let anchor = self.anchor_index(&index);
        if self.entries[anchor].is_available() {
            self.entries[anchor].index = Some(index);
            self.entries[anchor].value = Some(value);
            self.item_count += 1;
            return;
        }
        let mut cursor = anchor;
        while self.entries[cursor].next != NO_MORE {
            cursor = self.entries[cursor].next;
        }
        let cell = self.take_free_cell();
        self.entries[cell].index = Some(index);
        self.entries[cell].value = Some(value);
        self.entries[cursor].next = cell;
        self.item_count += 1;
    }

    /// Inserts `(value, index)` immediately after the anchor, so a
    /// subsequent `get` sees it before any previously added entry with
    /// the same key (used by MultiValue containers).
    pub fn add_front(&mut self, value: V, index: K) {
        if self.entries[self.anchor_index(&index)].is_available() {
            let anchor = self.anchor_index(&index);
            self.entries[anchor].index = Some(index);
            self.entries[anchor].value = Some(value);
            self.item_count += 1;
            return;
        }
        let anchor = self.anchor_index(&index);
        let displaced = self.entries[anchor].clone();
        let cell = self.take_free_cell();
        self.entries[cell] = displaced;
        self.entries[anchor].index = Some(index);
        self.entries[anchor].value = Some(value);
        self.entries[anchor].next = cell;
        self.item_count += 1;
    }

    /// Returns the first chain entry matching `index`.
    #[must_use]
    pub fn get(&self, index: &K) -> Option<&V> {
        let mut cursor = self.anchor_index(index);
        loop {
            if self.entries[cursor].index.as_ref() == Some(index) {
                return self.entries[cursor].value.as_ref();
            }
            if self.entries[cursor].next == NO_MORE {
                return None;
            }
            cursor = self.entries[cursor].next;
        }
    }

    /// Returns every value stored under `index`, in insertion order.
    #[must_use]
    pub fn get_all(&self, index: &K) -> Vec<&V> {
        let mut out = Vec::new();
        if self.entries[self.anchor_index(index)].is_available() {
            return out;
        }
        let mut cursor = self.anchor_index(index);
        loop {
            if self.entries[cursor].index.as_ref() == Some(index) {
                if let Some(v) = self.entries[cursor].value.as_ref() {
                    out.push(v);
                }
            }
            if self.entries[cursor].next == NO_MORE {
                break;
            }
            cursor = self.entries[cursor].next;
        }
        out
    }

    /// Removes the first match for `index`, per the chain-link removal
    /// policy (§4.1 `remove`).
    pub fn remove(&mut self, index: &K) -> Option<V> {
        let anchor = self.anchor_index(index);
        if self.entries[anchor].is_available() {
            return None;
        }
        if self.entries[anchor].index.as_ref() == Some(index) {
            let removed = self.entries[anchor].value.take();
            self.entries[anchor].index = None;
            let successor = self.entries[anchor].next;
            if successor != NO_MORE {
                let moved = self.entries[successor].clone();
                self.entries[anchor] = moved;
                self.return_free_cell(successor);
            } else {
                self.entries[anchor].next = NO_MORE;
            }
            self.item_count -= 1;
            return removed;
        }
        let mut prev = anchor;
        let mut cursor = self.entries[anchor].next;
        while cursor != NO_MORE {
            if self.entries[cursor].index.as_ref() == Some(index) {
                let removed = self.entries[cursor].value.take();
                self.entries[prev].next = self.entries[cursor].next;
                self.return_free_cell(cursor);
                self.item_count -= 1;
                return removed;
            }
            prev = cursor;
            cursor = self.entries[cursor].next;
        }
        None
    }

    /// Removes the first entry matching `value` (and, if given, `index`)
    /// by a linear bucket-by-bucket search.
    pub fn remove_item(&mut self, value: &V, index: Option<&K>) -> bool
    where
        V: PartialEq,
    {
        for anchor in 0..self.bucket_size {
            if self.entries[anchor].is_available() {
                continue;
            }
            let mut prev: Option<usize> = None;
            let mut cursor = anchor;
            loop {
                let matches_index = index.is_none_or(|i| self.entries[cursor].index.as_ref() == Some(i));
                let matches_value = self.entries[cursor].value.as_ref() == Some(value);
                if matches_index && matches_value {
                    if cursor == anchor {
                        let successor = self.entries[anchor].next;
                        self.entries[anchor].index = None;
                        self.entries[anchor].value = None;
                        if successor != NO_MORE {
                            let moved = self.entries[successor].clone();
                            self.entries[anchor] = moved;
                            self.return_free_cell(successor);
                        } else {
                            self.entries[anchor].next = NO_MORE;
                        }
                    } else if let Some(p) = prev {
                        self.entries[p].next = self.entries[cursor].next;
                        self.return_free_cell(cursor);
                    }
                    self.item_count -= 1;
                    return true;
                }
                if self.entries[cursor].next == NO_MORE {
                    break;
                }
                prev = Some(cursor);
                cursor = self.entries[cursor].next;
            }
        }
        false
    }

    /// Advances an index-scoped iteration: walks `next` links from
    /// `position` until another entry matching `index` is found.
    #[must_use]
    pub fn next_match(&self, index: &K, position: usize) -> usize {
        let mut cursor = self.entries[position].next;
        while cursor != NO_MORE {
            if self.entries[cursor].index.as_ref() == Some(index) {
                return cursor;
            }
            cursor = self.entries[cursor].next;
        }
        NO_MORE
    }

    /// For every in-use cell, adds it into `target` only if `target` does
    /// not already have an equal key (add-if-absent; preserves order
    /// among equal indexes already present in `target`).
    pub fn merge(&self, target: &mut Self) {
        for entry in &self.entries {
            if let (Some(index), Some(value)) = (&entry.index, &entry.value) {
                if target.get(index).is_none() {
                    target.add(value.clone(), index.clone());
                }
            }
        }
    }

    /// For every in-use cell, calls `target.put`, overwriting existing
    /// entries in `target`.
    pub fn put_all(&self, target: &mut Self) {
        for entry in &self.entries {
            if let (Some(index), Some(value)) = (&entry.index, &entry.value) {
                target.put(value.clone(), index.clone());
            }
        }
    }

    fn bulk_move(&self, capacity: usize, use_put: bool) -> Self {
        let mut fresh = Self::new(capacity, self.put_is_add_front);
        for anchor in 0..self.bucket_size {
            let mut cursor = anchor;
            if self.entries[cursor].is_available() {
                continue;
            }
            loop {
                let entry = &self.entries[cursor];
                if let (Some(index), Some(value)) = (&entry.index, &entry.value) {
                    if use_put {
                        fresh.put(value.clone(), index.clone());
                    } else {
                        fresh.add(value.clone(), index.clone());
                    }
                }
                if entry.next == NO_MORE {
                    break;
                }
                cursor = entry.next;
            }
        }
        fresh
    }

    /// Bulk-moves every cell into a larger table via `add`, preserving
    /// relative order among equal indexes. Used by expansion.
    #[must_use]
    pub fn re_merge(&self, new_bucket_size: usize) -> Self {
        self.bulk_move(new_bucket_size, false)
    }

    /// Bulk-moves every cell into a table of the same shape via `put`;
    /// used after deserialization when hash codes may have changed.
    #[must_use]
    pub fn re_hash(&self, new_bucket_size: usize) -> Self {
        self.bulk_move(new_bucket_size, true)
    }

    /// Clears every in-use cell and reinitializes the free chain.
    pub fn clear(&mut self) {
        let bucket_size = self.bucket_size;
        let total_size = self.entries.len();
        for entry in &mut self.entries {
            entry.clear();
        }
        for i in bucket_size..total_size {
            self.entries[i].next = if i + 1 < total_size { i + 1 } else { NO_MORE };
        }
        self.free_chain = if bucket_size < total_size { bucket_size } else { NO_MORE };
        self.item_count = 0;
    }

    /// Iterates `(index, value)` pairs in bucket order, insertion order
    /// within a bucket. Used by [`crate::iter`] and [`crate::supplier`].
    pub(crate) fn entries(&self) -> &[ContentEntry<K, V>] {
        &self.entries
    }

    /// Overwrites the value at `position` in place, leaving the key and
    /// chain links untouched. Used by [`crate::iter::ForwardIterMut::replace`].
    pub(crate) fn set_value_at(&mut self, position: usize, value: V) {
        self.entries[position].value = Some(value);
    }

    /// Collapses `anchor`'s chain successor into the anchor cell and
    /// returns the vacated successor to the free chain (§4.1 `remove`,
    /// "match at the anchor with a successor" case). Caller guarantees
    /// `anchor` has a successor.
    pub(crate) fn collapse_anchor(&mut self, anchor: usize) {
        let successor = self.entries[anchor].next;
        debug_assert_ne!(successor, NO_MORE, "collapse_anchor requires a successor");
        let moved = self.entries[successor].clone();
        self.entries[anchor] = moved;
        self.return_free_cell(successor);
        self.item_count -= 1;
    }

    /// Clears a bare anchor cell that has no successor (§4.1 `remove`,
    /// "match is at the anchor and is the only cell" case).
    pub(crate) fn clear_anchor(&mut self, anchor: usize) {
        self.entries[anchor].index = None;
        self.entries[anchor].value = None;
        self.entries[anchor].next = NO_MORE;
        self.item_count -= 1;
    }

    /// Unlinks the overflow cell at `position` from `anchor`'s chain by
    /// rescanning from the anchor to find its predecessor, then returns it
    /// to the free chain (§4.1 `remove`, "otherwise" case). `position`
    /// must not be `anchor` itself.
    pub(crate) fn unlink_from_chain(&mut self, anchor: usize, position: usize) {
        let mut prev = anchor;
        while self.entries[prev].next != position {
            prev = self.entries[prev].next;
        }
        self.entries[prev].next = self.entries[position].next;
        self.return_free_cell(position);
        self.item_count -= 1;
    }
}

#[cfg(test)]
mod contents_test;
