// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use std::cell::Cell;

#[test]
fn slot_bitmap_allocates_lowest_free_and_reuses_freed() {
    let mut bitmap = SlotBitmap::new();
    let a = bitmap.alloc().unwrap();
    let b = bitmap.alloc().unwrap();
    assert_eq!(a, 0);
    assert_eq!(b, 1);
    bitmap.free(a);
    let c = bitmap.alloc().unwrap();
    assert_eq!(c, 0);
}

#[test]
fn slot_bitmap_exhausts_after_max_slots() {
    let mut bitmap = SlotBitmap::new();
    for _ in 0..MAX_SEMAPHORE_SLOTS {
        bitmap.alloc().unwrap();
    }
    assert!(bitmap.alloc().is_err());
}

#[test]
fn binary_semaphore_wait_post_round_trip() {
    let sem = Semaphore::create(1).expect("create semaphore");
    assert!(sem.try_wait());
    assert_eq!(sem.value(), 0);
    assert!(!sem.try_wait());
    sem.post();
    assert_eq!(sem.value(), 1);
    sem.remove();
}

#[test]
fn normalize_repairs_out_of_range_value() {
    let sem = Semaphore::create(1).expect("create semaphore");
    sem.set_value(7);
    sem.normalize();
    assert_eq!(sem.value(), 1);
    sem.remove();
}

#[test]
fn owned_mutex_locks_and_unlocks_tracking_owner() {
    let sem = Semaphore::create(1).expect("create semaphore");
    let mutex = OwnedMutex::new(sem);
    let owner = Cell::new(0);
    mutex.lock(|| owner.get(), |pid| owner.set(pid));
    assert_eq!(owner.get(), crate::process::current_pid());
    mutex.unlock(|| owner.set(0));
    assert_eq!(sem.value(), 1);
    sem.remove();
}

#[test]
fn owned_mutex_force_releases_a_dead_owner() {
    let sem = Semaphore::create(0).expect("create semaphore locked");
    let mutex = OwnedMutex::new(sem);
    // A PID that is guaranteed dead: fork and reap immediately.
    let child = unsafe { libc::fork() };
    if child == 0 {
        unsafe { libc::_exit(0) };
    }
    let mut status = 0i32;
    unsafe { libc::waitpid(child, &raw mut status, 0) };

    let owner = Cell::new(child);
    mutex.lock(|| owner.get(), |pid| owner.set(pid));
    assert_eq!(owner.get(), crate::process::current_pid());
    sem.remove();
}
