// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Named and session queue registry (§4, §5, §6).
//!
//! Queue headers form a singly linked chain rooted at the anchor's
//! `queue_chain` offset; each header in turn roots a FIFO-ordered chain of
//! items. A consumer blocked in `Pull(Wait)` sleeps on the queue's own
//! wait semaphore, created lazily on first wait and posted once by the
//! next `Push`.
//!
//! [`reap_dead_waiters`] and [`reap_dead_sessions`] sweep for *other*
//! processes' deaths; [`release_waiters_owned_by`] and
//! [`release_session_queues`] instead release the calling process's own
//! registrations as part of its own death cleanup, where liveness checks
//! on its own pid would not yet report it as dead.

use tracing::warn;

use crate::anchor::Registry;
use crate::error::QueueError;
use crate::process::{current_pid, current_session_id, is_alive};
use crate::records::{
    FixedName, MAX_QUEUE_WAITERS, NAME_MAX, QUEUE_ITEM_HEADER_SIZE, QueueHeaderRaw, QueueItemRaw,
    read_at, write_at,
};
use crate::segment::{NO_MORE, PoolKind};
use crate::semaphore::Semaphore;

/// Push ordering (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Fifo,
    Lifo,
}

/// Blocking behavior for `Pull` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    NoWait,
    Wait,
}

const HEADER_SIZE: usize = std::mem::size_of::<QueueHeaderRaw>();

/// Validates a queue name against the grammar: 1-63 uppercase characters
/// drawn from `[A-Z0-9._!?]`, and never the literal `SESSION`.
fn validate_name(name: &str) -> Result<FixedName, QueueError> {
    if name.is_empty() || name.len() > NAME_MAX {
        return Err(QueueError::BadName);
    }
    let upper = name.to_ascii_uppercase();
    if upper == "SESSION" {
        return Err(QueueError::BadName);
    }
    let valid = upper
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'!' | b'?'));
    if !valid {
        return Err(QueueError::BadName);
    }
    Ok(FixedName::from_str_uppercased(&upper))
}

fn find_queue(registry: &Registry, wanted: &str) -> Option<usize> {
    let mut cursor = registry.header().queue_chain;
    let bytes = registry.queue_pool.bytes();
    while cursor != NO_MORE {
        let header: QueueHeaderRaw = unsafe { read_at(bytes, cursor) };
        if header.name.matches(wanted) {
            return Some(cursor);
        }
        cursor = header.next;
    }
    None
}

/// Creates a named queue, or (if `name` is `None`) a synthetic
/// session-scoped queue named `S{session}Q{counter}` (§1.2, §6).
pub fn create(registry: &mut Registry, name: Option<&str>) -> Result<String, QueueError> {
    registry.with_lock(|registry| {
        let (fixed_name, display_name) = match name {
            Some(n) => {
                let upper = n.to_ascii_uppercase();
                let fixed = validate_name(n)?;
                if find_queue(registry, &upper).is_some() {
                    return Err(QueueError::BadName);
                }
                (fixed, upper)
            }
            None => {
                let mut header = registry.header();
                let session = current_session_id();
                loop {
                    let candidate = format!("S{session}Q{}", header.next_synthetic_queue_id);
                    header.next_synthetic_queue_id += 1;
                    if find_queue(registry, &candidate).is_none() {
                        registry.set_header(header);
                        break (FixedName::from_str_uppercased(&candidate), candidate);
                    }
                }
            }
        };

        let offset = registry
            .queue_pool
            .bump(HEADER_SIZE)
            .map_err(|_| QueueError::MemFail)?;
        let mut header = registry.header();
        let new_header = QueueHeaderRaw {
            name: fixed_name,
            owner_session: current_session_id(),
            is_session_queue: name.is_none(),
            next: header.queue_chain,
            ..QueueHeaderRaw::EMPTY
        };
        unsafe { write_at(registry.queue_pool.bytes_mut(), offset, new_header) };
        header.queue_chain = offset;
        registry.set_header(header);
        Ok(display_name)
    })
}

/// Returns the item count of a named queue. `"SESSION"` resolves to the
/// caller's own session queue, creating it on first query (§6 "Query").
pub fn query(registry: &mut Registry, name: &str) -> Result<u32, QueueError> {
    let upper = name.to_ascii_uppercase();
    let offset = if upper == "SESSION" {
        let session = current_session_id();
        let synthetic = format!("S{session}SESSION");
        match find_queue(registry, &synthetic) {
            Some(offset) => offset,
            None => create_session_queue(registry, &synthetic, session)?,
        }
    } else {
        find_queue(registry, &upper).ok_or(QueueError::NotRegistered)?
    };
    let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), offset) };
    Ok(header.item_count)
}

fn create_session_queue(
    registry: &mut Registry,
    synthetic: &str,
    session: crate::process::Pid,
) -> Result<usize, QueueError> {
    registry.with_lock(|registry| {
        let offset = registry
            .queue_pool
            .bump(HEADER_SIZE)
            .map_err(|_| QueueError::MemFail)?;
        let mut top = registry.header();
        let header = QueueHeaderRaw {
            name: FixedName::from_str_uppercased(synthetic),
            owner_session: session,
            is_session_queue: true,
            next: top.queue_chain,
            ..QueueHeaderRaw::EMPTY
        };
        unsafe { write_at(registry.queue_pool.bytes_mut(), offset, header) };
        top.queue_chain = offset;
        registry.set_header(top);
        Ok(offset)
    })
}

/// Returns how many consumers are currently blocked in `Pull(Wait)` on a
/// named queue, without affecting it. Used by death-cleanup tests and
/// diagnostics.
#[must_use]
pub fn waiting_count(registry: &Registry, name: &str) -> Option<u32> {
    let offset = find_queue(registry, &name.to_ascii_uppercase())?;
    let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), offset) };
    Some(header.waiting)
}

/// Deletes a named queue. Fails with [`QueueError::Busy`] if a consumer is
/// currently blocked in `Pull(Wait)` on it (§6 "Delete").
pub fn delete(registry: &mut Registry, name: &str) -> Result<(), QueueError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        let offset = find_queue(registry, &upper).ok_or(QueueError::NotRegistered)?;
        let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), offset) };
        if header.waiting > 0 {
            return Err(QueueError::Busy);
        }
        if header.wait_sem_id >= 0 {
            Semaphore::attach(header.wait_sem_id).remove();
        }
        if header.mutex_sem_id >= 0 {
            Semaphore::attach(header.mutex_sem_id).remove();
        }
        unlink(registry, offset);
        Ok(())
    })
}

fn unlink(registry: &mut Registry, offset: usize) {
    let mut top = registry.header();
    if top.queue_chain == offset {
        let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), offset) };
        top.queue_chain = header.next;
        registry.set_header(top);
        return;
    }
    let mut cursor = top.queue_chain;
    while cursor != NO_MORE {
        let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
        if header.next == offset {
            let target: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), offset) };
            header.next = target.next;
            unsafe { write_at(registry.queue_pool.bytes_mut(), cursor, header) };
            return;
        }
        cursor = header.next;
    }
}

/// Appends `payload` to the queue per `priority`, then wakes one waiting
/// consumer if any (§5, §6).
pub fn push(
    registry: &mut Registry,
    name: &str,
    payload: &[u8],
    priority: Priority,
) -> Result<(), QueueError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        let queue_offset = find_queue(registry, &upper).ok_or(QueueError::NotRegistered)?;

        maybe_compact_before_grow(registry);

        let item_offset = registry
            .queue_pool
            .bump(QUEUE_ITEM_HEADER_SIZE + payload.len())
            .map_err(|_| QueueError::MemFail)?;
        let payload_offset = item_offset + QUEUE_ITEM_HEADER_SIZE;
        let item = QueueItemRaw {
            next: NO_MORE,
            payload_offset,
            payload_size: payload.len(),
            timestamp: now_seconds(),
        };
        unsafe {
            write_at(registry.queue_pool.bytes_mut(), item_offset, item);
            registry.queue_pool.bytes_mut()[payload_offset..payload_offset + payload.len()]
                .copy_from_slice(payload);
        }
        registry.queue_pool.used_bytes += QUEUE_ITEM_HEADER_SIZE + payload.len();

        let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), queue_offset) };
        match priority {
            Priority::Fifo => {
                if header.last == NO_MORE {
                    header.first = item_offset;
                } else {
                    let mut last: QueueItemRaw = unsafe { read_at(registry.queue_pool.bytes(), header.last) };
                    last.next = item_offset;
                    unsafe { write_at(registry.queue_pool.bytes_mut(), header.last, last) };
                }
                header.last = item_offset;
            }
            Priority::Lifo => {
                let mut pushed = item;
                pushed.next = header.first;
                unsafe { write_at(registry.queue_pool.bytes_mut(), item_offset, pushed) };
                header.first = item_offset;
                if header.last == NO_MORE {
                    header.last = item_offset;
                }
            }
        }
        header.item_count += 1;
        let wake = header.waiting > 0;
        let wait_sem = header.wait_sem_id;
        unsafe { write_at(registry.queue_pool.bytes_mut(), queue_offset, header) };

        if wake && wait_sem >= 0 {
            Semaphore::attach(wait_sem).post();
        }
        Ok(())
    })
}

/// Removes and returns the head item. With `Wait::NoWait`, returns
/// `Err(QueueError::Empty)` immediately if the queue has nothing to pull;
/// with `Wait::Wait`, blocks a registered waiter until `Push` wakes it
/// (§5 "Pull(Wait)").
pub fn pull(registry: &mut Registry, name: &str, wait: Wait) -> Result<Vec<u8>, QueueError> {
    loop {
        let outcome = registry.with_lock(|registry| -> Result<PullOutcome, QueueError> {
            let upper = name.to_ascii_uppercase();
            let queue_offset = find_queue(registry, &upper).ok_or(QueueError::NotRegistered)?;
            let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), queue_offset) };

            if header.first != NO_MORE {
                let item: QueueItemRaw = unsafe { read_at(registry.queue_pool.bytes(), header.first) };
                let data = registry.queue_pool.bytes()
                    [item.payload_offset..item.payload_offset + item.payload_size]
                    .to_vec();
                header.first = item.next;
                if header.first == NO_MORE {
                    header.last = NO_MORE;
                }
                header.item_count -= 1;
                // Clear only this process's own registration, if it had one
                // (it may have dequeued without ever having waited). Other
                // waiters recorded in `waiting_pids` stay blocked on the
                // semaphore until a later Push wakes them in turn.
                if let Some(slot) = header
                    .waiting_pids
                    .iter()
                    .position(|&pid| pid == current_pid())
                {
                    header.waiting_pids[slot] = 0;
                    header.waiting = header.waiting.saturating_sub(1);
                }
                unsafe { write_at(registry.queue_pool.bytes_mut(), queue_offset, header) };
                registry.queue_pool.trial_counter += 1;
                registry.queue_pool.used_bytes = registry
                    .queue_pool
                    .used_bytes
                    .saturating_sub(QUEUE_ITEM_HEADER_SIZE + item.payload_size);
                return Ok(PullOutcome::Data(data));
            }

            if wait == Wait::NoWait {
                return Err(QueueError::Empty);
            }

            let sem = if header.wait_sem_id >= 0 {
                Semaphore::attach(header.wait_sem_id)
            } else {
                let sem = Semaphore::create(0).map_err(|_| QueueError::MemFail)?;
                header.wait_sem_id = sem.id();
                sem
            };
            let slot = header
                .waiting_pids
                .iter()
                .position(|&pid| pid == 0)
                .ok_or(QueueError::MemFail)?;
            header.waiting_pids[slot] = current_pid();
            header.waiting += 1;
            unsafe { write_at(registry.queue_pool.bytes_mut(), queue_offset, header) };
            Ok(PullOutcome::BlockOn(sem))
        })?;

        match outcome {
            PullOutcome::Data(data) => return Ok(data),
            PullOutcome::BlockOn(sem) => sem.wait(),
        }
    }
}

enum PullOutcome {
    Data(Vec<u8>),
    BlockOn(Semaphore),
}

fn maybe_compact_before_grow(registry: &mut Registry) {
    if registry.queue_pool.queue_pool_wants_compaction_first() {
        compact(registry);
    }
}

/// Rewrites every live queue header and item into a fresh, tightly packed
/// segment, dropping the accumulated garbage from consumed items (§4.4).
/// Called automatically before a push that would otherwise grow the pool
/// after five pulls, and periodically by `reap_dead_sessions`.
pub fn compact(registry: &mut Registry) {
    let old_header = registry.header();
    let target_size = if registry.queue_pool.queue_pool_wants_shrink() {
        (registry.queue_pool.size() / 2).max(PoolKind::Queue.standard_size())
    } else {
        registry.queue_pool.size()
    };

    let mut fresh = match crate::segment::Segment::create(target_size) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut write_cursor = 0usize;
    let mut used = 0usize;
    let mut new_chain = NO_MORE;
    let mut prev_new_offset: Option<usize> = None;

    let mut cursor = old_header.queue_chain;
    while cursor != NO_MORE {
        let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
        let next_cursor = header.next;
        let new_header_offset = write_cursor;
        write_cursor += HEADER_SIZE;

        let mut item_cursor = header.first;
        let mut new_first = NO_MORE;
        let mut new_last = NO_MORE;
        while item_cursor != NO_MORE {
            let item: QueueItemRaw = unsafe { read_at(registry.queue_pool.bytes(), item_cursor) };
            let new_item_offset = write_cursor;
            let new_payload_offset = new_item_offset + QUEUE_ITEM_HEADER_SIZE;
            write_cursor = new_payload_offset + item.payload_size;
            used += QUEUE_ITEM_HEADER_SIZE + item.payload_size;

            let rewritten = QueueItemRaw {
                next: NO_MORE,
                payload_offset: new_payload_offset,
                payload_size: item.payload_size,
                timestamp: item.timestamp,
            };
            unsafe {
                write_at(fresh.as_mut_slice(), new_item_offset, rewritten);
                let payload = registry.queue_pool.bytes()
                    [item.payload_offset..item.payload_offset + item.payload_size]
                    .to_vec();
                fresh.as_mut_slice()[new_payload_offset..new_payload_offset + item.payload_size]
                    .copy_from_slice(&payload);
            }
            if new_first == NO_MORE {
                new_first = new_item_offset;
            } else {
                let mut last: QueueItemRaw = unsafe { read_at(fresh.as_slice(), new_last) };
                last.next = new_item_offset;
                unsafe { write_at(fresh.as_mut_slice(), new_last, last) };
            }
            new_last = new_item_offset;
            item_cursor = item.next;
        }

        header.first = new_first;
        header.last = new_last;
        header.next = NO_MORE;
        unsafe { write_at(fresh.as_mut_slice(), new_header_offset, header) };

        if let Some(prev) = prev_new_offset {
            let mut prev_header: QueueHeaderRaw = unsafe { read_at(fresh.as_slice(), prev) };
            prev_header.next = new_header_offset;
            unsafe { write_at(fresh.as_mut_slice(), prev, prev_header) };
        } else {
            new_chain = new_header_offset;
        }
        prev_new_offset = Some(new_header_offset);
        cursor = next_cursor;
    }

    // §9 open question (i): the source adjusts qmemtop without re-verifying
    // qmemsizeused against the bytes actually written; recompute it here by
    // re-walking the freshly compacted chain and assert the two agree.
    #[cfg(debug_assertions)]
    {
        let mut verify_cursor = new_chain;
        let mut recomputed = 0usize;
        while verify_cursor != NO_MORE {
            let header: QueueHeaderRaw = unsafe { read_at(fresh.as_slice(), verify_cursor) };
            let mut item_cursor = header.first;
            while item_cursor != NO_MORE {
                let item: QueueItemRaw = unsafe { read_at(fresh.as_slice(), item_cursor) };
                recomputed += QUEUE_ITEM_HEADER_SIZE + item.payload_size;
                item_cursor = item.next;
            }
            verify_cursor = header.next;
        }
        debug_assert_eq!(recomputed, used, "compacted queue pool used-byte accounting drifted");
    }
    registry
        .queue_pool
        .replace_compacted(fresh, write_cursor, used);
    let mut new_anchor = registry.header();
    new_anchor.queue_chain = new_chain;
    registry.set_header(new_anchor);
    warn!(
        freed = old_header.queue_pool_used.saturating_sub(used),
        "compacted queue pool"
    );
}

/// Walks every session queue and deletes those whose owning session's
/// leader process is no longer alive (§1.2 supplement: exposed GC walk).
pub fn reap_dead_sessions(registry: &mut Registry) -> usize {
    let mut reaped = 0;
    loop {
        let dead = registry.with_lock(|registry| -> Option<String> {
            let mut cursor = registry.header().queue_chain;
            while cursor != NO_MORE {
                let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
                if header.is_session_queue && !is_alive(header.owner_session) && header.waiting == 0 {
                    return Some(header.name.as_str().to_string());
                }
                cursor = header.next;
            }
            None
        });
        match dead {
            Some(name) => {
                let _ = delete(registry, &name);
                reaped += 1;
            }
            None => break,
        }
    }
    reaped
}

/// Clears the waiting flag on any queue whose blocked consumer's process has
/// died, so that a subsequent [`query`] or [`delete`] is not stuck believing
/// the queue is busy forever (§5 "Cancellation": a dead waiter is cleaned up
/// by Detach, which resets the semaphore). Returns how many waiters were
/// cleared.
pub fn reap_dead_waiters(registry: &mut Registry) -> usize {
    registry.with_lock(|registry| {
        let mut cleared = 0;
        let mut cursor = registry.header().queue_chain;
        while cursor != NO_MORE {
            let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
            let mut dirty = false;
            for slot in 0..MAX_QUEUE_WAITERS {
                let pid = header.waiting_pids[slot];
                if pid != 0 && !is_alive(pid) {
                    header.waiting_pids[slot] = 0;
                    header.waiting = header.waiting.saturating_sub(1);
                    cleared += 1;
                    dirty = true;
                }
            }
            if dirty {
                unsafe { write_at(registry.queue_pool.bytes_mut(), cursor, header) };
            }
            cursor = header.next;
        }
        cleared
    })
}

/// Clears every waiter-table slot registered under `pid`, regardless of
/// whether `pid` is still alive. Unlike [`reap_dead_waiters`], this does not
/// consult [`is_alive`]: it runs as part of a dying process's own cleanup,
/// at which point `kill(pid, 0)` still reports that pid as alive (§5
/// "Process death"). Returns how many registrations were cleared.
pub fn release_waiters_owned_by(registry: &mut Registry, pid: crate::process::Pid) -> usize {
    registry.with_lock(|registry| {
        let mut cleared = 0;
        let mut cursor = registry.header().queue_chain;
        while cursor != NO_MORE {
            let mut header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
            if let Some(slot) = header.waiting_pids.iter().position(|&p| p == pid) {
                header.waiting_pids[slot] = 0;
                header.waiting = header.waiting.saturating_sub(1);
                unsafe { write_at(registry.queue_pool.bytes_mut(), cursor, header) };
                cleared += 1;
            }
            cursor = header.next;
        }
        cleared
    })
}

/// Deletes every session queue owned by `session`, skipping (without error)
/// any that [`delete`] refuses because another process is still waiting on
/// it. Unlike [`reap_dead_sessions`], does not require `session`'s leader to
/// already be dead: this runs as part of that very process's own death
/// cleanup, releasing its own session queue before it exits (§5 "Process
/// death"). Returns how many queues were deleted.
pub fn release_session_queues(registry: &mut Registry, session: crate::process::Pid) -> usize {
    let mut released = 0;
    loop {
        let name = registry.with_lock(|registry| -> Option<String> {
            let mut cursor = registry.header().queue_chain;
            while cursor != NO_MORE {
                let header: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
                if header.is_session_queue && header.owner_session == session {
                    return Some(header.name.as_str().to_string());
                }
                cursor = header.next;
            }
            None
        });
        match name {
            Some(name) => match delete(registry, &name) {
                Ok(()) => released += 1,
                Err(_) => break,
            },
            None => break,
        }
    }
    released
}

fn now_seconds() -> i64 {
    // SAFETY: time(NULL) has no preconditions and cannot fail.
    unsafe { libc::time(std::ptr::null_mut()) }
}

#[cfg(test)]
mod queue_test;
