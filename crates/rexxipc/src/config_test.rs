// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use std::sync::Mutex;

// Environment variables are process-global; serialize tests that touch them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn anchor_dir_prefers_rxhome() {
    let _guard = ENV_LOCK.lock().unwrap();
    // SAFETY: single-threaded with respect to other env-mutating tests via ENV_LOCK.
    unsafe {
        std::env::set_var("RXHOME", "/tmp/rxhome-test");
        std::env::remove_var("HOME");
    }
    assert_eq!(anchor_dir(), PathBuf::from("/tmp/rxhome-test"));
    unsafe {
        std::env::remove_var("RXHOME");
    }
}

#[test]
fn anchor_dir_falls_back_to_home_then_tmp() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var("RXHOME");
        std::env::set_var("HOME", "/tmp/home-test");
    }
    assert_eq!(anchor_dir(), PathBuf::from("/tmp/home-test"));

    unsafe {
        std::env::remove_var("HOME");
    }
    assert_eq!(anchor_dir(), PathBuf::from("/tmp"));
}

#[test]
fn ensure_anchor_file_creates_and_reopens() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = std::env::temp_dir().join(format!("rexxipc-cfgtest-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }
    let path = ensure_anchor_file().expect("first create");
    assert!(path.exists());
    ensure_anchor_file().expect("idempotent reopen");
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn ipc_key_is_stable_for_same_path_and_id() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = std::env::temp_dir().join(format!("rexxipc-keytest-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }
    let path = ensure_anchor_file().expect("create anchor");
    let k1 = ipc_key(&path, 1).expect("key 1");
    let k2 = ipc_key(&path, 1).expect("key 1 again");
    let k3 = ipc_key(&path, 2).expect("key 2");
    assert_eq!(k1, k2);
    assert_ne!(k1, k3);
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(&dir);
}
