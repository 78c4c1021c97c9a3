// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;

#[test]
fn identity_key_compares_by_pointer_not_contents() {
    let a = Rc::new(42);
    let b = Rc::new(42);
    let a1 = IdentityKey::new(a.clone());
    let a2 = IdentityKey::new(a);
    let b1 = IdentityKey::new(b);

    assert_eq!(a1, a2);
    assert_ne!(a1, b1);
}

#[test]
fn string_fold_is_case_insensitive() {
    assert_eq!(StringFold::new("Hello"), StringFold::new("HELLO"));
    assert_ne!(StringFold::new("Hello"), StringFold::new("World"));
    assert_eq!(StringFold::new("mixedCase").as_str(), "MIXEDCASE");
}
