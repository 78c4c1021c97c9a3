// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;

#[test]
fn fresh_pool_starts_at_standard_size() {
    let pool = Pool::create(PoolKind::Handler).expect("create pool");
    assert_eq!(pool.size(), PoolKind::Handler.standard_size());
    assert_eq!(pool.top(), 0);
}

#[test]
fn bump_advances_top_and_preserves_bytes() {
    let mut pool = Pool::create(PoolKind::Macro).expect("create pool");
    let off = pool.bump(16).expect("bump");
    assert_eq!(off, 0);
    pool.bytes_mut()[off..off + 4].copy_from_slice(b"abcd");
    let off2 = pool.bump(8).expect("bump");
    assert_eq!(off2, 16);
    assert_eq!(&pool.bytes()[0..4], b"abcd");
    assert_eq!(pool.top(), 24);
}

#[test]
fn bump_past_capacity_grows_the_segment() {
    let mut pool = Pool::create(PoolKind::Handler).expect("create pool");
    let standard = PoolKind::Handler.standard_size();
    pool.bump(standard - 64).expect("fill most of pool");
    pool.bytes_mut()[0..4].copy_from_slice(b"live");
    let before_top = pool.top();
    pool.bump(standard).expect("grow beyond original size");
    assert!(pool.size() > standard);
    // The data written before growth must have survived the copy.
    assert_eq!(&pool.bytes()[0..4], b"live");
    assert_eq!(pool.top(), before_top + standard);
}

#[test]
fn would_overflow_respects_safety_margin() {
    let pool = Pool::create(PoolKind::Queue).expect("create pool");
    let room = pool.size();
    assert!(pool.would_overflow(room));
    assert!(!pool.would_overflow(room - 64));
}

#[test]
fn queue_pool_requests_compaction_after_five_pulls() {
    let mut pool = Pool::create(PoolKind::Queue).expect("create pool");
    assert!(!pool.queue_pool_wants_compaction_first());
    pool.trial_counter = 5;
    assert!(pool.queue_pool_wants_compaction_first());
}
