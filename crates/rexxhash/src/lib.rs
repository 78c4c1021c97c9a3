// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Chained open-addressed hash storage backing REXX-style collections:
//! a low-level [`contents`] table, wrapped by a growth-aware
//! [`collection`] policy layer, with traversal via [`iter`] and
//! [`supplier`].

pub mod collection;
pub mod contents;
pub mod entry;
pub mod iter;
pub mod keys;
pub mod supplier;

pub use collection::{Collection, HashError, IndexOnlySet, StringMap};
pub use iter::{ForwardIter, ForwardIterMut, IndexIter, ReverseIter};
pub use keys::{IdentityKey, StringFold};
pub use supplier::Supplier;
