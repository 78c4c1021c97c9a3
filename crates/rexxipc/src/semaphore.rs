// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! System V semaphore wrappers.
//!
//! `apiSem` is a single process-wide mutex guarding every registry
//! mutation; each queue additionally owns a mutex semaphore (`enqsem`) and
//! a binary wait semaphore (`waitsem`) posted by producers and awaited by
//! consumers (§5). A small slot bitmap in the anchor tracks which of the
//! host's limited semaphore identifiers are in use, matching the "≤48 on
//! typical systems" budget called out in §4.5.

use crate::error::SegmentError;
use crate::process::{Pid, current_pid, is_alive};

/// Maximum number of semaphore slots the registry will hand out. Mirrors
/// the original implementation's typical-system ceiling.
pub const MAX_SEMAPHORE_SLOTS: usize = 48;

/// Fixed-size bitmap of which semaphore slots are currently allocated.
/// A `1` bit means the slot's System V id (tracked separately by whoever
/// allocated it) is live.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotBitmap(u64);

impl SlotBitmap {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Claims the lowest free slot, returning its index.
    pub fn alloc(&mut self) -> Result<usize, SegmentError> {
        for slot in 0..MAX_SEMAPHORE_SLOTS {
            if self.0 & (1 << slot) == 0 {
                self.0 |= 1 << slot;
                return Ok(slot);
            }
        }
        Err(SegmentError::SystemLimit)
    }

    pub fn free(&mut self, slot: usize) {
        self.0 &= !(1u64 << slot);
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// One System V semaphore (a set of size 1).
#[derive(Debug, Clone, Copy)]
pub struct Semaphore {
    id: i32,
}

impl Semaphore {
    /// Creates a new semaphore initialized to `initial` (0 or 1 for the
    /// mutex/event semaphores used here).
    pub fn create(initial: i16) -> Result<Self, SegmentError> {
        // SAFETY: IPC_PRIVATE always allocates a fresh semaphore set.
        let id = unsafe { libc::semget(libc::IPC_PRIVATE, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o600) };
        if id < 0 {
            return Err(SegmentError::SystemLimit);
        }
        let sem = Self { id };
        sem.set_value(initial);
        Ok(sem)
    }

    #[must_use]
    pub const fn attach(id: i32) -> Self {
        Self { id }
    }

    #[must_use]
    pub const fn id(self) -> i32 {
        self.id
    }

    fn op(self, delta: i16, flags: i16) -> bool {
        let mut sops = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: flags,
        };
        // SAFETY: `sops` is a single valid sembuf on the stack; `self.id`
        // was returned by a prior successful `semget`.
        let rc = unsafe { libc::semop(self.id, &raw mut sops, 1) };
        rc == 0
    }

    /// Blocking decrement (the "P" operation). Used to acquire a mutex or
    /// to wait on an event semaphore.
    pub fn wait(self) {
        while !self.op(-1, 0) {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                break;
            }
        }
    }

    /// Non-blocking decrement; returns `true` if it succeeded without
    /// blocking.
    #[must_use]
    pub fn try_wait(self) -> bool {
        self.op(-1, libc::IPC_NOWAIT as i16)
    }

    /// Increment (the "V" operation). Used to release a mutex or to signal
    /// a waiting consumer.
    pub fn post(self) {
        self.op(1, 0);
    }

    /// Reads the current semaphore value.
    #[must_use]
    pub fn value(self) -> i32 {
        // SAFETY: GETVAL takes no pointer argument beyond the semaphore id.
        unsafe { libc::semctl(self.id, 0, libc::GETVAL) }
    }

    /// Forces the value to `v`, bypassing normal wait/post accounting. Used
    /// both to initialize a fresh semaphore and to repair one left in a
    /// crash-damaged state.
    pub fn set_value(self, v: i16) {
        // SAFETY: SETVAL's variadic argument is a plain `c_int`-compatible
        // value; we pass it through libc's `union semun`-free API, which on
        // Linux/glibc accepts the value directly.
        unsafe {
            libc::semctl(self.id, 0, libc::SETVAL, i32::from(v));
        }
    }

    /// Defensive repair (§5): a value observed outside `{0,1}` is normalized
    /// back to `1`, undoing damage from a process that crashed mid-`semop`.
    pub fn normalize(self) {
        let v = self.value();
        if !(0..=1).contains(&v) {
            self.set_value(1);
        }
    }

    /// Removes the underlying kernel semaphore set. Only the last owner
    /// (the queue/registry that created it) should call this.
    pub fn remove(self) {
        // SAFETY: IPC_RMID on a valid id is always legal.
        unsafe {
            libc::semctl(self.id, 0, libc::IPC_RMID);
        }
    }
}

/// A mutex semaphore with an explicit recorded owner PID, so a crashed
/// holder can be detected and force-released instead of wedging every
/// other process forever (§5 "Shared-resource policy").
#[derive(Debug, Clone, Copy)]
pub struct OwnedMutex {
    sem: Semaphore,
}

impl OwnedMutex {
    #[must_use]
    pub const fn new(sem: Semaphore) -> Self {
        Self { sem }
    }

    #[must_use]
    pub const fn semaphore(self) -> Semaphore {
        self.sem
    }

    /// Acquires the mutex, force-releasing it first if the recorded owner
    /// (read via `owner`) is dead. `set_owner` is called with the current
    /// PID once the lock is actually held; it must write into the shared
    /// anchor so other processes can see who holds it.
    pub fn lock(self, owner: impl Fn() -> Pid, mut set_owner: impl FnMut(Pid)) {
        loop {
            if self.sem.try_wait() {
                set_owner(current_pid());
                return;
            }
            let holder = owner();
            if holder != 0 && !is_alive(holder) {
                // The recorded holder is gone; the semaphore is stuck at 0
                // forever otherwise. Force it back to the unlocked state
                // and retry the acquire.
                self.sem.set_value(1);
                continue;
            }
            self.sem.wait();
            set_owner(current_pid());
            return;
        }
    }

    pub fn unlock(self, mut clear_owner: impl FnMut()) {
        clear_owner();
        self.sem.post();
    }
}

#[cfg(test)]
mod semaphore_test;
