// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Plain-old-data record layouts overlaid directly onto pool bytes.
//!
//! Every record here is `#[repr(C)]` and addressed by *offset* into its
//! pool, never by pointer (§9, "Shared-memory pointers"): the pool's base
//! address differs per attached process and moves on every compaction.

use crate::segment::NO_MORE;

/// Maximum queue/macro/handler name length (§3).
pub const NAME_MAX: usize = 63;

/// A fixed-capacity, length-prefixed name buffer stored inline in a record.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FixedName {
    len: u8,
    bytes: [u8; NAME_MAX],
}

impl FixedName {
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; NAME_MAX],
    };

    /// Stores `s` uppercased, truncated to `NAME_MAX` bytes.
    #[must_use]
    pub fn from_str_uppercased(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        let src = upper.as_bytes();
        let len = src.len().min(NAME_MAX);
        let mut bytes = [0u8; NAME_MAX];
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            len: u8::try_from(len).unwrap_or(NAME_MAX as u8),
            bytes,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    #[must_use]
    pub fn matches(&self, other_uppercased: &str) -> bool {
        self.as_str() == other_uppercased
    }
}

/// Handler kind discriminant (§3, Handler Block).
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandlerKind {
    Subcommand = 0,
    Exit = 1,
    Function = 2,
}

/// Macro search-position flag (§6).
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MacroPosition {
    SearchBefore = 1,
    SearchAfter = 2,
}

/// Upper bound on concurrent `Pull(Wait)` consumers tracked per queue.
/// Chosen generously above any realistic fan-in; a waiter past this limit
/// fails registration with [`crate::error::QueueError::MemFail`] rather than
/// silently clobbering another waiter's slot.
pub const MAX_QUEUE_WAITERS: usize = 8;

/// Named or session queue header (§3).
///
/// `waiting` is a true count of blocked `Pull(Wait)` consumers, not a flag:
/// each registers its pid in the first free `waiting_pids` slot (0 meaning
/// empty) and clears only that slot on wakeup, so one process dequeuing
/// never disturbs another that is still blocked.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct QueueHeaderRaw {
    pub next: usize,
    pub waiting: u32,
    pub item_count: u32,
    pub waiting_pids: [i32; MAX_QUEUE_WAITERS],
    pub wait_sem_id: i32,
    pub mutex_sem_id: i32,
    pub first: usize,
    pub last: usize,
    pub name: FixedName,
    /// Creator's session id. For named queues this is informational; for
    /// session queues it is the lookup key.
    pub owner_session: i32,
    pub is_session_queue: bool,
}

impl QueueHeaderRaw {
    pub const EMPTY: Self = Self {
        next: NO_MORE,
        waiting: 0,
        item_count: 0,
        waiting_pids: [0; MAX_QUEUE_WAITERS],
        wait_sem_id: -1,
        mutex_sem_id: -1,
        first: NO_MORE,
        last: NO_MORE,
        name: FixedName::EMPTY,
        owner_session: 0,
        is_session_queue: false,
    };
}

/// A single queued item (§3); payload bytes follow immediately after this
/// header in the pool.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct QueueItemRaw {
    pub next: usize,
    pub payload_offset: usize,
    pub payload_size: usize,
    pub timestamp: i64,
}

/// Size of a `QueueItemRaw` header, for computing where payload bytes start.
pub const QUEUE_ITEM_HEADER_SIZE: usize = std::mem::size_of::<QueueItemRaw>();

/// Macro header (§3).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MacroHeaderRaw {
    pub next: usize,
    pub name: FixedName,
    pub image_offset: usize,
    pub image_size: usize,
    pub position: MacroPosition,
}

/// Handler registration block (§3). Shared layout for all three chains.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HandlerBlockRaw {
    pub next: usize,
    pub name: FixedName,
    pub module_name: FixedName,
    pub procedure_name: FixedName,
    pub entry_address: usize,
    pub module_handle: usize,
    pub user_area: [u8; 8],
    pub drop_authority: bool,
    pub owner_pid: i32,
    pub session_pid: i32,
    pub is_copy: bool,
    pub kind: HandlerKind,
}

impl HandlerBlockRaw {
    #[must_use]
    pub const fn is_free_master(&self) -> bool {
        !self.is_copy && self.owner_pid == 0 && self.entry_address == 0
    }
}

/// Magic/version tag stamped into a freshly created anchor so a second
/// attacher can tell the difference between "just created by me" and
/// "already initialized by someone else".
pub const ANCHOR_MAGIC: u32 = 0x5258_4950; // "RXIP"

/// The process-wide anchor record (§4, §5): ids for the three pools, the
/// registry-wide mutex semaphore, the semaphore-slot bitmap, and the chain
/// heads each registry walks.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AnchorRaw {
    pub magic: u32,
    pub macro_pool_id: i32,
    pub macro_pool_size: usize,
    pub macro_pool_top: usize,
    pub handler_pool_id: i32,
    pub handler_pool_size: usize,
    pub handler_pool_top: usize,
    pub queue_pool_id: i32,
    pub queue_pool_size: usize,
    pub queue_pool_top: usize,
    pub queue_pool_used: usize,
    pub api_sem_id: i32,
    pub semaphore_slots: u64,
    pub queue_chain: usize,
    pub macro_chain: usize,
    pub handler_chains: [usize; 3],
    pub next_synthetic_queue_id: u64,
}

impl AnchorRaw {
    pub const UNINITIALIZED: Self = Self {
        magic: 0,
        macro_pool_id: -1,
        macro_pool_size: 0,
        macro_pool_top: 0,
        handler_pool_id: -1,
        handler_pool_size: 0,
        handler_pool_top: 0,
        queue_pool_id: -1,
        queue_pool_size: 0,
        queue_pool_top: 0,
        queue_pool_used: 0,
        api_sem_id: -1,
        semaphore_slots: 0,
        queue_chain: NO_MORE,
        macro_chain: NO_MORE,
        handler_chains: [NO_MORE; 3],
        next_synthetic_queue_id: 1,
    };

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.magic == ANCHOR_MAGIC
    }
}

/// Reads a `T` out of `bytes` at `offset`. The caller guarantees `offset`
/// was produced by an allocation of at least `size_of::<T>()` bytes in the
/// same pool.
///
/// # Safety
/// `bytes` must contain a valid, initialized `T` at `offset`, and `T` must
/// be a plain-old-data type with no padding-dependent invariants.
pub unsafe fn read_at<T: Copy>(bytes: &[u8], offset: usize) -> T {
    debug_assert!(offset + std::mem::size_of::<T>() <= bytes.len());
    // SAFETY: forwarded from the caller's contract.
    unsafe { bytes.as_ptr().add(offset).cast::<T>().read_unaligned() }
}

/// Writes `value` into `bytes` at `offset`.
///
/// # Safety
/// `offset + size_of::<T>()` must be within `bytes`.
pub unsafe fn write_at<T: Copy>(bytes: &mut [u8], offset: usize, value: T) {
    debug_assert!(offset + std::mem::size_of::<T>() <= bytes.len());
    // SAFETY: forwarded from the caller's contract.
    unsafe {
        bytes
            .as_mut_ptr()
            .add(offset)
            .cast::<T>()
            .write_unaligned(value);
    }
}

#[cfg(test)]
mod records_test;
