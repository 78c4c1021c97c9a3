// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Subcommand/exit/function handler registry (§4.7).
//!
//! Three independent chains share one record layout ([`HandlerBlockRaw`]).
//! An *InProcess* registration stores a raw entry address and is never
//! seen outside the registering process. An *External* (module-backed)
//! registration's first record is the *master*; other processes that
//! resolve the same name get their own *copy* record that inherits the
//! cached module handle, so `dlopen` only runs once per module per
//! process generation.

use tracing::debug;

use crate::anchor::Registry;
use crate::error::HandlerError;
use crate::process::{current_pid, is_alive};
use crate::records::{FixedName, HandlerBlockRaw, HandlerKind, read_at, write_at};
use crate::segment::NO_MORE;

const HEADER_SIZE: usize = std::mem::size_of::<HandlerBlockRaw>();

fn chain_index(kind: HandlerKind) -> usize {
    kind as usize
}

/// A small ring buffer of the last three module handles this process has
/// closed, so a cleanup pass that revisits the same handle through two
/// different copy records does not double-`dlclose` it (§4.7 "Cleanup").
#[derive(Default)]
pub struct ClosedHandleRing {
    recent: [usize; 3],
    next_slot: usize,
}

impl ClosedHandleRing {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            recent: [0; 3],
            next_slot: 0,
        }
    }

    fn already_closed(&self, handle: usize) -> bool {
        self.recent.contains(&handle)
    }

    fn remember(&mut self, handle: usize) {
        self.recent[self.next_slot] = handle;
        self.next_slot = (self.next_slot + 1) % self.recent.len();
    }
}

/// What kind of entry point a registration resolves to.
pub enum Registration<'a> {
    /// An in-process function pointer, given as a raw address.
    InProcess { entry_address: usize },
    /// A module-backed registration, resolved lazily via `dlopen`/`dlsym`.
    External {
        module_name: &'a str,
        procedure_name: &'a str,
    },
}

fn find_in_own_process(registry: &Registry, kind: HandlerKind, name: &str) -> Option<usize> {
    let mut cursor = registry.header().handler_chains[chain_index(kind)];
    let bytes = registry.handler_pool.bytes();
    while cursor != NO_MORE {
        let block: HandlerBlockRaw = unsafe { read_at(bytes, cursor) };
        if block.name.matches(name) && block.owner_pid == current_pid() {
            return Some(cursor);
        }
        cursor = block.next;
    }
    None
}

fn find_free_master(registry: &Registry, kind: HandlerKind, name: &str) -> Option<usize> {
    let mut cursor = registry.header().handler_chains[chain_index(kind)];
    let bytes = registry.handler_pool.bytes();
    while cursor != NO_MORE {
        let block: HandlerBlockRaw = unsafe { read_at(bytes, cursor) };
        if block.name.matches(name) && block.is_free_master() {
            return Some(cursor);
        }
        cursor = block.next;
    }
    None
}

fn prepend(registry: &mut Registry, kind: HandlerKind, block: HandlerBlockRaw) -> Result<usize, HandlerError> {
    let offset = registry
        .handler_pool
        .bump(HEADER_SIZE)
        .map_err(|_| HandlerError::NoMem)?;
    let mut anchor = registry.header();
    let mut stored = block;
    stored.next = anchor.handler_chains[chain_index(kind)];
    unsafe { write_at(registry.handler_pool.bytes_mut(), offset, stored) };
    anchor.handler_chains[chain_index(kind)] = offset;
    registry.set_header(anchor);
    Ok(offset)
}

/// Registers a handler. `InProcess` registrations are always fresh copy
/// records; `External` registrations create the master record on first
/// use and reuse it afterward.
pub fn register(
    registry: &mut Registry,
    kind: HandlerKind,
    name: &str,
    registration: Registration<'_>,
) -> Result<(), HandlerError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        if find_in_own_process(registry, kind, &upper).is_some() {
            return Err(HandlerError::Duplicate);
        }

        match registration {
            Registration::InProcess { entry_address } => {
                let block = HandlerBlockRaw {
                    next: NO_MORE,
                    name: FixedName::from_str_uppercased(&upper),
                    module_name: FixedName::EMPTY,
                    procedure_name: FixedName::EMPTY,
                    entry_address,
                    module_handle: 0,
                    user_area: [0; 8],
                    drop_authority: false,
                    owner_pid: current_pid(),
                    session_pid: current_pid(),
                    is_copy: true,
                    kind,
                };
                prepend(registry, kind, block)?;
                Ok(())
            }
            Registration::External {
                module_name,
                procedure_name,
            } => {
                let block = HandlerBlockRaw {
                    next: NO_MORE,
                    name: FixedName::from_str_uppercased(&upper),
                    module_name: FixedName::from_str_uppercased(module_name),
                    procedure_name: FixedName::from_str_uppercased(procedure_name),
                    entry_address: 0,
                    module_handle: 0,
                    user_area: [0; 8],
                    drop_authority: true,
                    owner_pid: 0,
                    session_pid: 0,
                    is_copy: false,
                    kind,
                };
                prepend(registry, kind, block)?;
                Ok(())
            }
        }
    })
}

/// Resolves `name` to an entry address, following the ordered lookup
/// policy (§4.7): own-process in-address block, own-process module block,
/// then promotion of a free master into a new copy record. Loads the
/// module via `dlopen`/`dlsym` on first resolution of an external block.
pub fn resolve(registry: &mut Registry, kind: HandlerKind, name: &str) -> Result<usize, HandlerError> {
    let upper = name.to_ascii_uppercase();

    if let Some(offset) = registry.with_lock(|registry| find_in_own_process(registry, kind, &upper)) {
        let block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
        if block.entry_address != 0 {
            return Ok(block.entry_address);
        }
    }

    loop {
        let plan = registry.with_lock(|registry| -> Result<Option<(usize, HandlerBlockRaw)>, HandlerError> {
            if let Some(offset) = find_in_own_process(registry, kind, &upper) {
                let block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
                if block.entry_address != 0 {
                    return Ok(None);
                }
                return Ok(Some((offset, block)));
            }
            let master_offset = find_free_master(registry, kind, &upper).ok_or(HandlerError::NotRegistered)?;
            // Re-check the master is still free right before copying it:
            // another process may have raced us between the find above and
            // here. If it is no longer free, loop and re-resolve from the
            // top rather than promoting stale data.
            let master: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), master_offset) };
            if !master.is_free_master() {
                return Ok(Some((master_offset, master)));
            }
            let mut copy = master;
            copy.is_copy = true;
            copy.owner_pid = current_pid();
            copy.session_pid = current_pid();
            let offset = prepend(registry, kind, copy)?;
            Ok(Some((offset, copy)))
        })?;

        let Some((offset, block)) = plan else {
            let own = registry
                .with_lock(|registry| find_in_own_process(registry, kind, &upper))
                .ok_or(HandlerError::NotRegistered)?;
            let resolved: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), own) };
            return Ok(resolved.entry_address);
        };

        if block.entry_address != 0 {
            return Ok(block.entry_address);
        }

        let loaded = load_module(block.module_name.as_str(), block.procedure_name.as_str());
        registry.with_lock(|registry| -> Result<(), HandlerError> {
            match loaded {
                Ok((handle, entry)) => {
                    let mut updated: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
                    updated.module_handle = handle;
                    updated.entry_address = entry;
                    unsafe { write_at(registry.handler_pool.bytes_mut(), offset, updated) };
                    Ok(())
                }
                Err(e) => {
                    unlink(registry, kind, offset);
                    Err(e)
                }
            }
        })?;
        return Ok(loaded.map(|(_, entry)| entry).unwrap_or(0));
    }
}

fn unlink(registry: &mut Registry, kind: HandlerKind, offset: usize) {
    let mut anchor = registry.header();
    let head = chain_index(kind);
    if anchor.handler_chains[head] == offset {
        let block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
        anchor.handler_chains[head] = block.next;
        registry.set_header(anchor);
        return;
    }
    let mut cursor = anchor.handler_chains[head];
    while cursor != NO_MORE {
        let mut block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), cursor) };
        if block.next == offset {
            let target: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
            block.next = target.next;
            unsafe { write_at(registry.handler_pool.bytes_mut(), cursor, block) };
            return;
        }
        cursor = block.next;
    }
}

fn load_module(module_name: &str, procedure_name: &str) -> Result<(usize, usize), HandlerError> {
    let c_module = std::ffi::CString::new(module_name).map_err(|_| HandlerError::ModuleNotFound)?;
    // SAFETY: `c_module` is a valid NUL-terminated string for the call's duration.
    let handle = unsafe { libc::dlopen(c_module.as_ptr(), libc::RTLD_NOW) };
    if handle.is_null() {
        return Err(HandlerError::ModuleNotFound);
    }
    let c_proc = std::ffi::CString::new(procedure_name).map_err(|_| HandlerError::EntryNotFound)?;
    // SAFETY: `handle` is a live handle returned by the `dlopen` above.
    let symbol = unsafe { libc::dlsym(handle, c_proc.as_ptr()) };
    if symbol.is_null() {
        // SAFETY: closing a handle we just successfully opened and are
        // abandoning due to the missing symbol.
        unsafe {
            libc::dlclose(handle);
        }
        return Err(HandlerError::EntryNotFound);
    }
    Ok((handle as usize, symbol as usize))
}

/// Drops a handler registration owned by the calling process. Copy and
/// in-address records unlink outright; master records are instead marked
/// free for reuse (§4.7 "Drop policy").
pub fn drop_handler(registry: &mut Registry, kind: HandlerKind, name: &str) -> Result<(), HandlerError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        let offset = find_in_own_process(registry, kind, &upper).ok_or(HandlerError::NotRegistered)?;
        let block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), offset) };
        if block.owner_pid != current_pid() {
            return Err(HandlerError::NoCanDrop);
        }
        if block.is_copy {
            unlink(registry, kind, offset);
        } else {
            let mut freed = block;
            freed.owner_pid = 0;
            freed.session_pid = 0;
            freed.entry_address = 0;
            freed.module_handle = 0;
            unsafe { write_at(registry.handler_pool.bytes_mut(), offset, freed) };
        }
        Ok(())
    })
}

/// Runs the process-exit cleanup pass across all three chains (§4.7
/// "Cleanup on process exit"): closes cached module handles owned by
/// `exiting`, deduplicating via `closed`, then unlinks or frees every
/// block whose session belongs to `exiting`.
pub fn cleanup_on_exit(registry: &mut Registry, exiting: libc::pid_t, closed: &mut ClosedHandleRing) {
    registry.with_lock(|registry| {
        for kind in [HandlerKind::Subcommand, HandlerKind::Exit, HandlerKind::Function] {
            let head = chain_index(kind);
            let mut cursor = registry.header().handler_chains[head];
            let mut to_unlink = Vec::new();
            while cursor != NO_MORE {
                let mut block: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), cursor) };
                let next = block.next;

                if block.owner_pid == exiting && block.module_handle != 0 && !closed.already_closed(block.module_handle) {
                    // SAFETY: `module_handle` was returned by a prior
                    // successful `dlopen` from this same process.
                    unsafe {
                        libc::dlclose(block.module_handle as *mut libc::c_void);
                    }
                    closed.remember(block.module_handle);
                    debug!(handle = block.module_handle, "closed handler module");
                }

                let session_dead = block.session_pid == exiting
                    || (block.session_pid != 0 && !is_alive(block.session_pid));
                if session_dead {
                    if block.is_copy {
                        to_unlink.push(cursor);
                    } else {
                        block.session_pid = 0;
                        block.owner_pid = 0;
                        block.entry_address = 0;
                        block.module_handle = 0;
                        unsafe { write_at(registry.handler_pool.bytes_mut(), cursor, block) };
                    }
                }
                cursor = next;
            }
            for offset in to_unlink {
                unlink(registry, kind, offset);
            }
        }
    });
}

#[cfg(test)]
mod handlers_test;
