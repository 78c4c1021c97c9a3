// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;
use crate::anchor::Registry;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn fresh_registry(tag: &str) -> (Registry, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("rexxipc-macrotest-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    unsafe {
        std::env::set_var("RXHOME", &dir);
    }
    (Registry::attach().expect("attach fresh registry"), dir)
}

fn teardown(registry: Registry, dir: std::path::PathBuf) {
    registry.destroy();
    unsafe {
        std::env::remove_var("RXHOME");
    }
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn add_query_drop_round_trip() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("a");

    add(&mut registry, "greet", b"say hello", MacroPosition::SearchAfter).unwrap();
    assert_eq!(query(&registry, "GREET"), Some(MacroPosition::SearchAfter));
    assert_eq!(execute(&registry, "greet").unwrap(), b"say hello");

    drop_macro(&mut registry, "greet").unwrap();
    assert_eq!(query(&registry, "greet"), None);

    teardown(registry, dir);
}

#[test]
fn add_replaces_existing_image_in_place() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("b");

    add(&mut registry, "M", b"first", MacroPosition::SearchBefore).unwrap();
    add(&mut registry, "M", b"second-longer-image", MacroPosition::SearchAfter).unwrap();

    assert_eq!(execute(&registry, "M").unwrap(), b"second-longer-image");
    assert_eq!(query(&registry, "M"), Some(MacroPosition::SearchAfter));

    teardown(registry, dir);
}

#[test]
fn save_then_load_round_trips_through_a_fresh_registry() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("c");
    let file = dir.join("macros.rxm");

    add(&mut registry, "ONE", b"image-one", MacroPosition::SearchAfter).unwrap();
    add(&mut registry, "TWO", b"image-two-longer", MacroPosition::SearchBefore).unwrap();
    save(&registry, None, &file).unwrap();

    drop_macro(&mut registry, "ONE").unwrap();
    drop_macro(&mut registry, "TWO").unwrap();

    let loaded = load(&mut registry, None, &file).unwrap();
    assert_eq!(loaded, 2);
    assert_eq!(execute(&registry, "ONE").unwrap(), b"image-one");
    assert_eq!(execute(&registry, "TWO").unwrap(), b"image-two-longer");

    teardown(registry, dir);
}

#[test]
fn load_rejects_a_name_already_registered_without_mutating_state() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("d");
    let file = dir.join("macros.rxm");

    add(&mut registry, "ONE", b"image-one", MacroPosition::SearchAfter).unwrap();
    save(&registry, None, &file).unwrap();

    // ONE is still registered, so a full reload of the same file must fail
    // and must not disturb the existing registration.
    let err = load(&mut registry, None, &file);
    assert_eq!(err, Err(MacroError::AlreadyExists));
    assert_eq!(execute(&registry, "ONE").unwrap(), b"image-one");

    teardown(registry, dir);
}

#[test]
fn load_with_explicit_names_rejects_one_missing_from_the_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("e");
    let file = dir.join("macros.rxm");

    add(&mut registry, "ONE", b"image-one", MacroPosition::SearchAfter).unwrap();
    save(&registry, None, &file).unwrap();
    drop_macro(&mut registry, "ONE").unwrap();

    let err = load(&mut registry, Some(&["ONE", "GHOST"]), &file);
    assert_eq!(err, Err(MacroError::SourceNotFound));
    assert_eq!(query(&registry, "ONE"), None);

    teardown(registry, dir);
}

#[test]
fn load_rejects_a_file_with_the_wrong_signature() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("f");
    let bogus = dir.join("bogus.rxm");
    std::fs::write(&bogus, b"not a macro file at all, too short").unwrap();

    let err = load(&mut registry, None, &bogus);
    assert!(matches!(err, Err(MacroError::SignatureError) | Err(MacroError::FileError)));

    teardown(registry, dir);
}

#[test]
fn clear_removes_every_registration() {
    let _guard = ENV_LOCK.lock().unwrap();
    let (mut registry, dir) = fresh_registry("g");

    add(&mut registry, "A", b"x", MacroPosition::SearchAfter).unwrap();
    add(&mut registry, "B", b"y", MacroPosition::SearchAfter).unwrap();
    clear(&mut registry).unwrap();

    assert_eq!(query(&registry, "A"), None);
    assert_eq!(query(&registry, "B"), None);

    teardown(registry, dir);
}
