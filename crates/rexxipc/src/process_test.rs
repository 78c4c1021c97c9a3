// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;

#[test]
fn current_process_is_alive() {
    assert!(is_alive(current_pid()));
}

#[test]
fn reaped_pid_is_not_alive() {
    // SAFETY: fork() a disposable child, wait for it to exit, then probe it.
    // This is the canonical way to obtain a guaranteed-dead PID for the test.
    let child = unsafe { libc::fork() };
    if child == 0 {
        // SAFETY: _exit terminates this child immediately without running
        // destructors shared with the parent's address space.
        unsafe { libc::_exit(0) };
    }
    assert!(child > 0, "fork failed");
    let mut status = 0i32;
    // SAFETY: waitpid with a valid child pid and a stack-local status pointer.
    unsafe { libc::waitpid(child, &raw mut status, 0) };
    assert!(!is_alive(child));
}

#[test]
fn zero_and_negative_pids_are_not_alive() {
    assert!(!is_alive(0));
    assert!(!is_alive(-1));
}
