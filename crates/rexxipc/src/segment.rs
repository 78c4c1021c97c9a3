// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Shared-memory segments and the growable pools built on top of them.
//!
//! A [`Segment`] is one System V shared-memory region (`shmget`/`shmat`).
//! A [`Pool`] wraps a segment with a bump pointer (`top`) and grows or
//! shrinks it by allocating a fresh, larger or smaller segment and copying
//! the live bytes across -- mirroring how `UntypedAllocator` in the
//! original root task hands out watermarked regions, except here the
//! region itself can be replaced wholesale when it runs out of room.

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::error::SegmentError;

/// Sentinel meaning "no further link" for any `next`/chain offset.
pub const NO_MORE: usize = usize::MAX;

/// Which pool a segment backs. Each kind has its own standard starting
/// size and its own growth/shrink policy (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Tokenized macro images.
    Macro,
    /// Subcommand/exit/function handler registrations.
    Handler,
    /// Named and session queues plus their items.
    Queue,
}

impl PoolKind {
    /// Standard starting/shrink-floor size for a pool of this kind.
    #[must_use]
    pub const fn standard_size(self) -> usize {
        match self {
            Self::Macro => 16 * 1024,
            Self::Handler => 8 * 1024,
            Self::Queue => 32 * 1024,
        }
    }

    /// Safety margin subtracted from free space before an allocation is
    /// considered to fit without growing (§4.4 step 2).
    const SAFETY_MARGIN: usize = 10;
}

/// One System V shared-memory region, attached in this process's address
/// space. Dropping it detaches (never removes) the kernel segment; removal
/// is an explicit operation since other processes may still be attached.
pub struct Segment {
    shm_id: i32,
    base: NonNull<u8>,
    size: usize,
}

// SAFETY: the region is exclusively mutated by the registry under `apiSem`;
// the handle itself carries no thread-confinement requirement.
unsafe impl Send for Segment {}

impl Segment {
    /// Creates a brand new, zero-filled System V shared-memory segment and
    /// attaches it read-write.
    pub fn create(size: usize) -> Result<Self, SegmentError> {
        // SAFETY: IPC_PRIVATE always allocates a fresh kernel segment; the
        // returned id is checked for failure before use.
        let shm_id = unsafe {
            libc::shmget(
                libc::IPC_PRIVATE,
                size,
                libc::IPC_CREAT | libc::IPC_EXCL | 0o600,
            )
        };
        if shm_id < 0 {
            return Err(Self::classify_errno());
        }
        Self::attach_existing(shm_id, size)
    }

    /// Attaches to an already-existing segment by its System V id.
    pub fn attach_existing(shm_id: i32, size: usize) -> Result<Self, SegmentError> {
        // SAFETY: shmat with a null requested address lets the kernel pick
        // a mapping; the result is checked against `(void *) -1` (the
        // documented failure sentinel) before being treated as a pointer.
        let raw = unsafe { libc::shmat(shm_id, std::ptr::null(), 0) };
        if raw.cast::<i8>() as isize == -1 {
            return Err(Self::classify_errno());
        }
        let base = NonNull::new(raw.cast::<u8>()).ok_or(SegmentError::OutOfMemory)?;
        Ok(Self { shm_id, base, size })
    }

    pub(crate) fn classify_errno() -> SegmentError {
        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ENOMEM | libc::ENOSPC) => SegmentError::OutOfMemory,
            Some(libc::EMFILE | libc::ENFILE) => SegmentError::SystemLimit,
            Some(libc::EACCES | libc::EPERM) => SegmentError::PermissionDenied,
            _ => SegmentError::SystemLimit,
        }
    }

    /// The System V id for this segment, stable across processes.
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.shm_id
    }

    /// Size of the mapping in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Raw byte view of the whole segment.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `base` is a valid attached mapping of `size` bytes for
        // the lifetime of this `Segment`.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.size) }
    }

    /// Mutable raw byte view of the whole segment.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; exclusive access is upheld by `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), self.size) }
    }

    /// Marks the underlying kernel segment for removal once every process
    /// detaches. Only the pool owner (the process performing a grow/shrink
    /// replacement or a final shutdown) should call this.
    pub fn mark_for_removal(&self) {
        // SAFETY: IPC_RMID on a valid, still-attached id is always legal;
        // removal only takes effect once the last attachment detaches.
        unsafe {
            libc::shmctl(self.shm_id, libc::IPC_RMID, std::ptr::null_mut());
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        // SAFETY: `base` was returned by a successful `shmat` and is only
        // detached once, here.
        unsafe {
            libc::shmdt(self.base.as_ptr().cast::<c_void>());
        }
    }
}

/// A growable shared-memory arena: a [`Segment`] plus a bump pointer.
///
/// `Pool` only knows how to grow, shrink, and hand out raw byte ranges. The
/// policy for *when* to compact instead of grow, and how to re-serialize
/// live records during compaction, belongs to the registry that understands
/// the record shapes stored in the pool (see `queue::QueueRegistry::compact`).
pub struct Pool {
    kind: PoolKind,
    segment: Segment,
    top: usize,
    /// Bytes reachable from live records; only meaningfully tracked for
    /// `PoolKind::Queue` (others compact-on-free so `top` already reflects it).
    pub used_bytes: usize,
    /// Queue items pulled since the last compaction; gates compaction
    /// frequency (`trialCounter`, §4.4).
    pub trial_counter: u32,
}

impl Pool {
    /// Creates a fresh pool of the kind's standard size.
    pub fn create(kind: PoolKind) -> Result<Self, SegmentError> {
        let segment = Segment::create(kind.standard_size())?;
        Ok(Self {
            kind,
            segment,
            top: 0,
            used_bytes: 0,
            trial_counter: 0,
        })
    }

    /// Attaches to an existing pool segment without resetting its contents.
    pub fn attach(kind: PoolKind, shm_id: i32, size: usize, top: usize, used_bytes: usize) -> Result<Self, SegmentError> {
        let segment = Segment::attach_existing(shm_id, size)?;
        Ok(Self {
            kind,
            segment,
            top,
            used_bytes,
            trial_counter: 0,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> PoolKind {
        self.kind
    }

    #[must_use]
    pub const fn shm_id(&self) -> i32 {
        self.segment.id()
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.segment.size()
    }

    #[must_use]
    pub const fn top(&self) -> usize {
        self.top
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.segment.as_slice()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.segment.as_mut_slice()
    }

    /// Ensures at least `bytes` free space before `top`, growing the pool
    /// if needed per the kind's policy, then bumps `top` and returns the
    /// offset of the newly reserved range.
    ///
    /// Callers that need compaction instead of a plain grow (the `Queue`
    /// path in §4.4) must call [`Pool::needs_compaction`] first and run
    /// their own compaction before calling this.
    pub fn bump(&mut self, bytes: usize) -> Result<usize, SegmentError> {
        self.ensure_free(bytes)?;
        let offset = self.top;
        self.top += bytes;
        Ok(offset)
    }

    /// Whether an allocation of `bytes` would not fit in the current
    /// headroom (the `bytes > size - top - SAFETY_MARGIN` test of §4.4).
    #[must_use]
    pub fn would_overflow(&self, bytes: usize) -> bool {
        bytes + PoolKind::SAFETY_MARGIN > self.segment.size().saturating_sub(self.top)
    }

    fn ensure_free(&mut self, bytes: usize) -> Result<(), SegmentError> {
        while self.would_overflow(bytes) {
            let new_size = self.segment.size() + self.kind.standard_size();
            self.resize_to(new_size)?;
        }
        Ok(())
    }

    /// Replaces the backing segment with one of `new_size` bytes, copying
    /// `[0, top)` across and marking the old segment for removal. Used both
    /// by plain growth and by a registry's own compaction (which first
    /// rewrites `top`/contents via [`Pool::bytes_mut`] into the *current*
    /// segment, then calls this only if the compacted form still needs a
    /// different size).
    pub fn resize_to(&mut self, new_size: usize) -> Result<(), SegmentError> {
        let mut new_segment = Segment::create(new_size)?;
        let keep = self.top.min(new_size);
        new_segment.as_mut_slice()[..keep].copy_from_slice(&self.segment.as_slice()[..keep]);
        self.segment.mark_for_removal();
        self.segment = new_segment;
        Ok(())
    }

    /// Shrinks the pool to `new_size` in place when the caller has already
    /// compacted live data into `[0, new_size)` of the *current* segment --
    /// used by named-queue-pool compaction, which must copy into a fresh
    /// segment of the compacted size directly (no separate resize needed).
    pub fn replace_compacted(&mut self, compacted: Segment, new_top: usize, new_used: usize) {
        self.segment.mark_for_removal();
        self.segment = compacted;
        self.top = new_top;
        self.used_bytes = new_used;
        self.trial_counter = 0;
    }

    /// Runs the shrink-on-free checks common to Macro/Handler pools: if
    /// `top` has fallen below a quarter of capacity and the pool is above
    /// its standard size, halve it.
    pub fn maybe_shrink(&mut self) -> Result<(), SegmentError> {
        let size = self.segment.size();
        let floor = self.kind.standard_size();
        if size > floor && self.top < size / 2 - PoolKind::SAFETY_MARGIN {
            let new_size = (size / 2).max(floor);
            self.resize_to(new_size)?;
        }
        Ok(())
    }

    /// The periodic `CheckForMemory` queue-pool GC pass (§4.4): while usage
    /// has fallen under a quarter of capacity and the pool exceeds its
    /// floor, signal that a compacting halve is due. The registry performs
    /// the actual walk-and-copy, then calls [`Pool::replace_compacted`].
    #[must_use]
    pub fn queue_pool_wants_shrink(&self) -> bool {
        let size = self.segment.size();
        size > self.kind.standard_size() && self.used_bytes < size / 4
    }

    /// Whether compaction should be attempted before growing a queue pool:
    /// at least five items have been pulled since the last compaction.
    #[must_use]
    pub const fn queue_pool_wants_compaction_first(&self) -> bool {
        self.trial_counter >= 5
    }

    /// Marks the backing segment for removal once every attached process
    /// detaches. Only the registry teardown path calls this.
    pub fn mark_segment_for_removal(&self) {
        self.segment.mark_for_removal();
    }
}

#[cfg(test)]
mod segment_test;
