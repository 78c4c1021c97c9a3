// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! The process-wide anchor: the single well-known shared-memory segment
//! every attaching process finds first via `ftok`, from which it learns
//! the ids of the three pools and the registry mutex.

use tracing::{debug, info};

use crate::config;
use crate::error::SegmentError;
use crate::handlers::ClosedHandleRing;
use crate::process::{self, current_pid};
use crate::records::{AnchorRaw, read_at, write_at};
use crate::segment::{Pool, PoolKind, Segment};
use crate::semaphore::{OwnedMutex, Semaphore, SlotBitmap};

/// `ftok` project id for the anchor segment itself.
const ANCHOR_PROJ_ID: u8 = 0;

/// A handle to the attached registry: the anchor segment, the three record
/// pools, and the process-wide mutex guarding all of it.
pub struct Registry {
    anchor: Segment,
    pub macro_pool: Pool,
    pub handler_pool: Pool,
    pub queue_pool: Pool,
    api_mutex: OwnedMutex,
}

/// Offset of the `api_sem_id`'s recorded-owner PID within the anchor
/// segment, stored just past the `AnchorRaw` record itself.
const OWNER_PID_OFFSET: usize = std::mem::size_of::<AnchorRaw>();

impl Registry {
    /// Attaches to the registry, creating it if this is the first process
    /// to do so since the anchor file was (re)created.
    pub fn attach() -> Result<Self, SegmentError> {
        let path = config::ensure_anchor_file()?;
        let key = config::ipc_key(&path, ANCHOR_PROJ_ID)?;
        let size = std::mem::size_of::<AnchorRaw>() + std::mem::size_of::<libc::pid_t>();

        // SAFETY: IPC_CREAT|IPC_EXCL races are resolved below by falling
        // back to a plain attach when the segment already exists.
        let created = unsafe { libc::shmget(key, size, libc::IPC_CREAT | libc::IPC_EXCL | 0o600) };
        let (shm_id, first_attacher) = if created >= 0 {
            (created, true)
        } else {
            // SAFETY: key is the same ftok-derived key; 0 requests no
            // creation flags, only a lookup of the existing segment.
            let existing = unsafe { libc::shmget(key, size, 0o600) };
            if existing < 0 {
                return Err(Segment::classify_errno());
            }
            (existing, false)
        };

        let mut anchor = Segment::attach_existing(shm_id, size)?;
        if first_attacher {
            info!("creating fresh rexxipc registry at {}", path.display());
            Self::initialize(&mut anchor)?;
        } else {
            debug!("attaching to existing rexxipc registry at {}", path.display());
            // Another process may be between shmget and the write of
            // ANCHOR_MAGIC; wait briefly for initialization to finish.
            Self::wait_for_initialization(&anchor);
        }

        let header: AnchorRaw = unsafe { read_at(anchor.as_slice(), 0) };
        let macro_pool = Pool::attach(
            PoolKind::Macro,
            header.macro_pool_id,
            header.macro_pool_size,
            header.macro_pool_top,
            0,
        )?;
        let handler_pool = Pool::attach(
            PoolKind::Handler,
            header.handler_pool_id,
            header.handler_pool_size,
            header.handler_pool_top,
            0,
        )?;
        let queue_pool = Pool::attach(
            PoolKind::Queue,
            header.queue_pool_id,
            header.queue_pool_size,
            header.queue_pool_top,
            header.queue_pool_used,
        )?;
        let api_mutex = OwnedMutex::new(Semaphore::attach(header.api_sem_id));

        process::install_death_handler(Self::run_death_cleanup);

        Ok(Self {
            anchor,
            macro_pool,
            handler_pool,
            queue_pool,
            api_mutex,
        })
    }

    /// Reads the pid currently recorded as holding the registry mutex, or
    /// `0` if it is free.
    #[must_use]
    pub fn api_mutex_owner(&self) -> libc::pid_t {
        unsafe { read_at::<i32>(self.anchor.as_slice(), OWNER_PID_OFFSET) }
    }

    /// Force-releases the registry mutex if this process is its recorded
    /// owner. A process caught mid-`with_lock` by a fatal signal would
    /// otherwise leave `apiSem` held forever, wedging every other attached
    /// process (§5 "Process death").
    pub fn release_api_mutex_if_self_owns_it(&mut self) {
        if self.api_mutex_owner() == current_pid() {
            unsafe { write_at(self.anchor.as_mut_slice(), OWNER_PID_OFFSET, 0i32) };
            self.api_mutex.semaphore().post();
        }
    }

    /// Re-attaches fresh and releases every resource this process holds:
    /// the registry mutex if held, this pid's `Pull(Wait)` registrations,
    /// its own session queue, and its handler records. Run once by the
    /// background reaper thread installed in [`Self::attach`] when a fatal
    /// signal arrives (§2, §5 "Process death").
    fn run_death_cleanup() {
        let Ok(mut registry) = Self::attach() else {
            return;
        };
        registry.release_api_mutex_if_self_owns_it();
        let pid = current_pid();
        crate::queue::release_waiters_owned_by(&mut registry, pid);
        crate::queue::release_session_queues(&mut registry, crate::process::current_session_id());
        crate::handlers::cleanup_on_exit(&mut registry, pid, &mut ClosedHandleRing::new());
    }

    fn initialize(anchor: &mut Segment) -> Result<(), SegmentError> {
        let macro_pool = Pool::create(PoolKind::Macro)?;
        let handler_pool = Pool::create(PoolKind::Handler)?;
        let queue_pool = Pool::create(PoolKind::Queue)?;
        let api_sem = Semaphore::create(1)?;
        api_sem.normalize();

        let header = AnchorRaw {
            magic: crate::records::ANCHOR_MAGIC,
            macro_pool_id: macro_pool.shm_id(),
            macro_pool_size: macro_pool.size(),
            macro_pool_top: macro_pool.top(),
            handler_pool_id: handler_pool.shm_id(),
            handler_pool_size: handler_pool.size(),
            handler_pool_top: handler_pool.top(),
            queue_pool_id: queue_pool.shm_id(),
            queue_pool_size: queue_pool.size(),
            queue_pool_top: queue_pool.top(),
            queue_pool_used: queue_pool.used_bytes,
            api_sem_id: api_sem.id(),
            semaphore_slots: SlotBitmap::new().raw(),
            ..AnchorRaw::UNINITIALIZED
        };
        unsafe {
            write_at(anchor.as_mut_slice(), 0, header);
            write_at(anchor.as_mut_slice(), OWNER_PID_OFFSET, 0i32);
        }
        Ok(())
    }

    fn wait_for_initialization(anchor: &Segment) {
        for _ in 0..1000 {
            let header: AnchorRaw = unsafe { read_at(anchor.as_slice(), 0) };
            if header.is_initialized() {
                return;
            }
            std::thread::yield_now();
        }
    }

    /// Runs `f` with exclusive access to the registry, persisting any pool
    /// growth `f` performed back into the anchor record before releasing
    /// the mutex.
    pub fn with_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let anchor_ptr: *mut Segment = &raw mut self.anchor;
        self.api_mutex.lock(
            || unsafe { read_at::<i32>((*anchor_ptr).as_slice(), OWNER_PID_OFFSET) } as libc::pid_t,
            |pid| unsafe { write_at((*anchor_ptr).as_mut_slice(), OWNER_PID_OFFSET, pid) },
        );
        let result = f(self);
        self.sync_header();
        self.api_mutex.unlock(|| unsafe {
            write_at(self.anchor.as_mut_slice(), OWNER_PID_OFFSET, 0i32);
        });
        result
    }

    fn sync_header(&mut self) {
        let mut header: AnchorRaw = unsafe { read_at(self.anchor.as_slice(), 0) };
        header.macro_pool_id = self.macro_pool.shm_id();
        header.macro_pool_size = self.macro_pool.size();
        header.macro_pool_top = self.macro_pool.top();
        header.handler_pool_id = self.handler_pool.shm_id();
        header.handler_pool_size = self.handler_pool.size();
        header.handler_pool_top = self.handler_pool.top();
        header.queue_pool_id = self.queue_pool.shm_id();
        header.queue_pool_size = self.queue_pool.size();
        header.queue_pool_top = self.queue_pool.top();
        header.queue_pool_used = self.queue_pool.used_bytes;
        unsafe { write_at(self.anchor.as_mut_slice(), 0, header) };
    }

    /// Reads the current anchor header without taking the mutex; callers
    /// use this for read-only lookups (chain heads, synthetic-name counter).
    #[must_use]
    pub fn header(&self) -> AnchorRaw {
        unsafe { read_at(self.anchor.as_slice(), 0) }
    }

    /// Writes an updated header back without taking the mutex; only valid
    /// while the caller already holds the lock via [`Registry::with_lock`].
    pub fn set_header(&mut self, header: AnchorRaw) {
        unsafe { write_at(self.anchor.as_mut_slice(), 0, header) };
    }

    /// Tears the whole registry down: marks every segment and the mutex
    /// semaphore for removal. Intended for `ipc-doctor`-style maintenance
    /// tools, never called as part of normal attach/detach.
    pub fn destroy(self) {
        self.macro_pool.mark_segment_for_removal();
        self.handler_pool.mark_segment_for_removal();
        self.queue_pool.mark_segment_for_removal();
        self.api_mutex.semaphore().remove();
        self.anchor.mark_for_removal();
    }
}

#[cfg(test)]
mod anchor_test;
