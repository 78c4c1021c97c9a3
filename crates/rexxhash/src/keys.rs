// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Key wrappers selecting the hash/equality policy a [`crate::contents::Contents`]
//! uses, per the variant table: Identity compares by reference, StringKey
//! compares byte-for-byte after upper-casing. Plain `K: Hash + Eq` types
//! are used directly for the Equality and MultiValue variants, since both
//! share ordinary value hashing and only differ in `put` semantics.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Wraps a reference-counted value so hashing and equality are based on
/// pointer identity rather than the pointee's contents (the Identity
/// variant, §4.1).
#[derive(Debug, Clone)]
pub struct IdentityKey<T: ?Sized>(pub Rc<T>);

impl<T: ?Sized> IdentityKey<T> {
    #[must_use]
    pub fn new(value: Rc<T>) -> Self {
        Self(value)
    }
}

impl<T: ?Sized> PartialEq for IdentityKey<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for IdentityKey<T> {}

impl<T: ?Sized> Hash for IdentityKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0).cast::<()>() as usize).hash(state);
    }
}

/// Wraps a string so hashing and equality fold case before comparing (the
/// StringKey variant, §4.1). Two keys differing only in case collide into
/// the same bucket and chain position.
#[derive(Debug, Clone, Eq)]
pub struct StringFold(String);

impl StringFold {
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self(s.to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for StringFold {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Hash for StringFold {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod keys_test;
