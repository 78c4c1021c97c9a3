// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Process-death detection and cleanup-on-death handling.
//!
//! Centralizes the `kill(pid, 0)` liveness probe behind one function so
//! that registry code never open-codes the `errno == ESRCH` check and so
//! tests can stub liveness without touching real PIDs. [`install_death_handler`]
//! additionally wires `SIGINT`/`SIGTERM`/`SIGSEGV` to a background reaper
//! thread so an attached process's held resources are released even when
//! it never reaches its normal exit path (§2, §5 "Process death").

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGSEGV, SIGTERM};
use tracing::warn;

/// The PID type used throughout the registry. A raw OS process id.
pub type Pid = libc::pid_t;

/// Returns the current process's PID.
#[must_use]
pub fn current_pid() -> Pid {
    // SAFETY: getpid() has no preconditions and cannot fail.
    unsafe { libc::getpid() }
}

/// Returns the current process's session id (the PID of the session leader,
/// used by the registry as the default session-queue key).
#[must_use]
pub fn current_session_id() -> Pid {
    // SAFETY: getsid(0) queries the caller's own session and cannot fail
    // for a valid caller.
    let sid = unsafe { libc::getsid(0) };
    if sid < 0 { current_pid() } else { sid }
}

/// Reports whether `pid` still identifies a live process.
///
/// Implemented as `kill(pid, 0)`: the kernel performs the permission and
/// existence checks but delivers no signal. `ESRCH` means the process is
/// gone; any other outcome (including `EPERM`, which means it exists but
/// we cannot signal it) is treated as alive.
#[must_use]
pub fn is_alive(pid: Pid) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill with signal 0 performs no action beyond existence/permission
    // checks; passing an arbitrary pid is always safe.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    err.raw_os_error() != Some(libc::ESRCH)
}

static DEATH_HANDLER_INSTALLED: Once = Once::new();

/// Installs a handler for `SIGINT`/`SIGTERM`/`SIGSEGV` that runs `cleanup`
/// once, from a dedicated background thread, before the process actually
/// terminates (§2 "A cleanup handler returns resources on process death",
/// §5 "Process death"). Idempotent across repeated calls (e.g. once per
/// [`crate::anchor::Registry::attach`]) so every attaching binary gets
/// coverage without double-installing.
///
/// The signal handler itself only flags an `AtomicBool`, which is
/// async-signal-safe for any signal including `SIGSEGV`; `cleanup` runs
/// later on the reaper thread, not inside the handler.
pub fn install_death_handler(mut cleanup: impl FnMut() + Send + 'static) {
    DEATH_HANDLER_INSTALLED.call_once(|| {
        let flagged = Arc::new(AtomicBool::new(false));
        for &signal in &[SIGINT, SIGTERM, SIGSEGV] {
            if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&flagged)) {
                warn!(signal, %err, "failed to install process-death handler");
            }
        }
        std::thread::spawn(move || {
            loop {
                if flagged.load(Ordering::SeqCst) {
                    warn!(pid = current_pid(), "process death signal received, running cleanup");
                    cleanup();
                    std::process::exit(130);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });
    });
}

#[cfg(test)]
mod process_test;
