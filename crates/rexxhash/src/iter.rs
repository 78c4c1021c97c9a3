// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Forward, reverse and index-scoped traversal over a [`Contents`] table
//! (§4.3).

use std::hash::Hash;

use crate::contents::Contents;
use crate::entry::NO_MORE;

/// `(contents-ref, position, nextBucket)`: walks the current chain, then
/// scans forward for the next occupied bucket anchor.
pub struct ForwardIter<'a, K, V> {
    contents: &'a Contents<K, V>,
    position: usize,
    next_bucket: usize,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> ForwardIter<'a, K, V> {
    pub(crate) fn new(contents: &'a Contents<K, V>) -> Self {
        let mut iter = Self {
            contents,
            position: NO_MORE,
            next_bucket: 0,
        };
        iter.advance_to_next_bucket();
        iter
    }

    fn advance_to_next_bucket(&mut self) {
        let bucket_size = self.contents.bucket_size();
        let entries = self.contents.entries();
        while self.next_bucket < bucket_size {
            let candidate = self.next_bucket;
            self.next_bucket += 1;
            if !entries[candidate].is_available() {
                self.position = candidate;
                return;
            }
        }
        self.position = NO_MORE;
    }

    #[must_use]
    pub const fn available(&self) -> bool {
        self.position != NO_MORE
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.contents.entries()[self.position].value.as_ref()
    }

    #[must_use]
    pub fn index(&self) -> Option<&'a K> {
        self.contents.entries()[self.position].index.as_ref()
    }

    /// Walks the chain; at end-of-chain, scans `nextBucket..bucketSize`
    /// for the next occupied anchor.
    pub fn advance(&mut self) {
        if !self.available() {
            return;
        }
        let next_in_chain = self.contents.entries()[self.position].next;
        if next_in_chain != NO_MORE {
            self.position = next_in_chain;
        } else {
            self.advance_to_next_bucket();
        }
    }
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for ForwardIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.available() {
            return None;
        }
        let item = (self.index()?, self.value()?);
        self.advance();
        Some(item)
    }
}

/// `(contents-ref, position, currentBucket)`: visits every cell once,
/// tail-to-anchor within a bucket, buckets in ascending order.
pub struct ReverseIter<'a, K, V> {
    contents: &'a Contents<K, V>,
    position: usize,
    current_bucket: usize,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> ReverseIter<'a, K, V> {
    pub(crate) fn new(contents: &'a Contents<K, V>) -> Self {
        let mut iter = Self {
            contents,
            position: NO_MORE,
            current_bucket: 0,
        };
        iter.enter_bucket_from_tail(0);
        iter
    }

    fn tail_of_chain(&self, anchor: usize) -> usize {
        let entries = self.contents.entries();
        let mut cursor = anchor;
        while entries[cursor].next != NO_MORE {
            cursor = entries[cursor].next;
        }
        cursor
    }

    fn enter_bucket_from_tail(&mut self, start: usize) {
        let bucket_size = self.contents.bucket_size();
        let entries = self.contents.entries();
        let mut bucket = start;
        while bucket < bucket_size {
            if !entries[bucket].is_available() {
                self.current_bucket = bucket;
                self.position = self.tail_of_chain(bucket);
                return;
            }
            bucket += 1;
        }
        self.position = NO_MORE;
    }

    #[must_use]
    pub const fn available(&self) -> bool {
        self.position != NO_MORE
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.contents.entries()[self.position].value.as_ref()
    }

    #[must_use]
    pub fn index(&self) -> Option<&'a K> {
        self.contents.entries()[self.position].index.as_ref()
    }

    /// Finds the predecessor of `position` in its bucket's chain by a
    /// linear scan from the anchor, since chains carry no back-links.
    pub fn advance(&mut self) {
        if !self.available() {
            return;
        }
        let anchor = self.current_bucket;
        if self.position == anchor {
            self.enter_bucket_from_tail(anchor + 1);
            return;
        }
        let entries = self.contents.entries();
        let mut cursor = anchor;
        while entries[cursor].next != self.position {
            cursor = entries[cursor].next;
        }
        self.position = cursor;
    }
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for ReverseIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.available() {
            return None;
        }
        let item = (self.index()?, self.value()?);
        self.advance();
        Some(item)
    }
}

/// `(contents-ref, position, nextBucket)`, mutably: same traversal as
/// [`ForwardIter`], but borrows the `Contents` exclusively so it can also
/// `replace` the current value or `remove_current` it (§4.3, §9 "Iterator
/// invalidation"). All other mutation of the underlying table is
/// statically prevented for the iterator's lifetime.
pub struct ForwardIterMut<'a, K, V> {
    contents: &'a mut Contents<K, V>,
    position: usize,
    current_anchor: usize,
    next_bucket: usize,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> ForwardIterMut<'a, K, V> {
    pub(crate) fn new(contents: &'a mut Contents<K, V>) -> Self {
        let mut iter = Self {
            contents,
            position: NO_MORE,
            current_anchor: NO_MORE,
            next_bucket: 0,
        };
        iter.advance_to_next_bucket();
        iter
    }

    fn advance_to_next_bucket(&mut self) {
        let bucket_size = self.contents.bucket_size();
        let entries = self.contents.entries();
        while self.next_bucket < bucket_size {
            let candidate = self.next_bucket;
            self.next_bucket += 1;
            if !entries[candidate].is_available() {
                self.position = candidate;
                self.current_anchor = candidate;
                return;
            }
        }
        self.position = NO_MORE;
        self.current_anchor = NO_MORE;
    }

    #[must_use]
    pub const fn available(&self) -> bool {
        self.position != NO_MORE
    }

    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.contents.entries()[self.position].value.as_ref()
    }

    #[must_use]
    pub fn index(&self) -> Option<&K> {
        self.contents.entries()[self.position].index.as_ref()
    }

    /// Overwrites the value at the current position in place (§4.3
    /// `replace`).
    pub fn replace(&mut self, value: V) {
        if !self.available() {
            return;
        }
        self.contents.set_value_at(self.position, value);
    }

    /// Walks the chain; at end-of-chain, scans `nextBucket..bucketSize`
    /// for the next occupied anchor.
    pub fn advance(&mut self) {
        if !self.available() {
            return;
        }
        let next_in_chain = self.contents.entries()[self.position].next;
        if next_in_chain != NO_MORE {
            self.position = next_in_chain;
        } else {
            self.advance_to_next_bucket();
        }
    }

    /// Removes the current entry and leaves the iterator positioned at the
    /// next one, per §4.3's three documented cases:
    /// - at the anchor with a chain successor: the successor is copied
    ///   into the anchor, so `position` (still `anchor`) is already valid;
    /// - at the anchor with no successor: advance first (reading the
    ///   soon-to-be-cleared cell's own `next`, which is `NoMore`, is safe),
    ///   then clear the anchor;
    /// - past the anchor: save the current position, advance, then unlink
    ///   the saved position from its chain by rescanning from the anchor.
    pub fn remove_current(&mut self) {
        if !self.available() {
            return;
        }
        let anchor = self.current_anchor;
        if self.position == anchor {
            if self.contents.entries()[anchor].next != NO_MORE {
                self.contents.collapse_anchor(anchor);
            } else {
                self.advance_to_next_bucket();
                self.contents.clear_anchor(anchor);
            }
        } else {
            let removed = self.position;
            self.advance();
            self.contents.unlink_from_chain(anchor, removed);
        }
    }
}

/// `(contents-ref, index, position)`: enumerates only entries whose key
/// equals the captured index, in insertion order along the chain.
pub struct IndexIter<'a, K, V> {
    contents: &'a Contents<K, V>,
    index: K,
    position: usize,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> IndexIter<'a, K, V> {
    pub(crate) fn new(contents: &'a Contents<K, V>, index: K) -> Self {
        let entries = contents.entries();
        let bucket = {
            // Mirror Contents' own anchor addressing without exposing it
            // publicly: the first chain cell for `index`, if any.
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            use std::hash::Hasher;
            index.hash(&mut hasher);
            (hasher.finish() % contents.bucket_size() as u64) as usize
        };
        let mut position = NO_MORE;
        if !entries[bucket].is_available() {
            let mut cursor = bucket;
            loop {
                if entries[cursor].index.as_ref() == Some(&index) {
                    position = cursor;
                    break;
                }
                if entries[cursor].next == NO_MORE {
                    break;
                }
                cursor = entries[cursor].next;
            }
        }
        Self {
            contents,
            index,
            position,
        }
    }

    #[must_use]
    pub const fn available(&self) -> bool {
        self.position != NO_MORE
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.contents.entries()[self.position].value.as_ref()
    }

    pub fn advance(&mut self) {
        if !self.available() {
            return;
        }
        self.position = self.contents.next_match(&self.index, self.position);
    }
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for IndexIter<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.available() {
            return None;
        }
        let item = self.value()?;
        self.advance();
        Some(item)
    }
}

#[cfg(test)]
mod iter_test;
