// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn isolated_home() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("rexxipc-anchortest-{}-{:p}", std::process::id(), &0u8));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn attach_creates_then_reattaches_same_pools() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = isolated_home();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }

    let registry = Registry::attach().expect("first attach creates registry");
    let macro_id = registry.macro_pool.shm_id();
    let queue_id = registry.queue_pool.shm_id();

    let registry2 = Registry::attach().expect("second attach reuses registry");
    assert_eq!(registry2.macro_pool.shm_id(), macro_id);
    assert_eq!(registry2.queue_pool.shm_id(), queue_id);

    registry2.destroy();
    drop(registry);
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn release_api_mutex_if_self_owns_it_only_acts_when_self_is_the_owner() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = isolated_home();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }

    let mut registry = Registry::attach().expect("attach");
    assert_eq!(registry.api_mutex_owner(), 0);

    // Not the owner: releasing is a no-op.
    registry.release_api_mutex_if_self_owns_it();
    assert_eq!(registry.api_mutex_owner(), 0);

    registry.with_lock(|_| {});
    assert_eq!(registry.api_mutex_owner(), 0, "with_lock clears ownership on exit");

    registry.destroy();
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn with_lock_persists_pool_growth_across_attaches() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = isolated_home();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }

    let mut registry = Registry::attach().expect("attach");
    registry.with_lock(|r| {
        r.macro_pool.bump(64).expect("bump macro pool");
    });
    let top_after = registry.macro_pool.top();
    assert_eq!(top_after, 64);

    let registry2 = Registry::attach().expect("reattach sees persisted top");
    assert_eq!(registry2.macro_pool.top(), 64);

    registry2.destroy();
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(&dir);
}
