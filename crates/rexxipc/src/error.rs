// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Error enumerations for the cross-process registry.
//!
//! Each subsystem reports a small enumeration of its own; nothing here is
//! a general-purpose catch-all. Callers map these onto whatever condition
//! model their host exposes.

use thiserror::Error;

/// Errors raised by the segment manager while growing or shrinking a pool.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// The host refused to enlarge or create a shared-memory segment.
    #[error("out of memory enlarging shared segment")]
    OutOfMemory,
    /// The host's System V IPC limits were exhausted (too many segments/semaphores).
    #[error("system resource limit reached")]
    SystemLimit,
    /// The anchor file could not be opened with read+write permission.
    #[error("permission denied on IPC anchor file")]
    PermissionDenied,
}

/// Errors raised by the named/session queue registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Operation completed (used where callers want a uniform `Result` shape).
    #[error("ok")]
    Ok,
    /// Queue name fails the grammar in the queue-name grammar rules.
    #[error("invalid queue name")]
    BadName,
    /// Named queue does not exist.
    #[error("queue not registered")]
    NotRegistered,
    /// Push priority flag was neither FIFO nor LIFO.
    #[error("invalid push priority")]
    BadPriority,
    /// Pull wait flag was neither `NoWait` nor `Wait`.
    #[error("invalid wait flag")]
    BadWaitFlag,
    /// `Pull(NoWait)` found no item.
    #[error("queue is empty")]
    Empty,
    /// `Delete` attempted while a consumer is blocked in `Pull(Wait)`.
    #[error("queue is busy: a consumer is waiting")]
    Busy,
    /// The segment manager could not satisfy the allocation this call needed.
    #[error("shared memory allocation failed")]
    MemFail,
}

/// Errors raised by the macro registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MacroError {
    /// Operation completed.
    #[error("ok")]
    Ok,
    /// The MacroPool could not be grown to hold the new image.
    #[error("no storage available for macro image")]
    NoStorage,
    /// Named macro is not registered.
    #[error("macro not found")]
    NotFound,
    /// `Load` without an explicit name list found a name already registered.
    #[error("macro already exists")]
    AlreadyExists,
    /// The save/load file could not be opened, read, or written.
    #[error("macro file I/O error")]
    FileError,
    /// The save file's version tag or signature did not match.
    #[error("macro file signature mismatch")]
    SignatureError,
    /// A name requested from `Load` was not present in the source file.
    #[error("requested macro not found in source file")]
    SourceNotFound,
    /// Position flag was neither `SearchBefore` nor `SearchAfter`.
    #[error("invalid macro search position")]
    InvalidPosition,
}

/// Errors raised by the handler registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HandlerError {
    /// Operation completed.
    #[error("ok")]
    Ok,
    /// Named handler is not registered.
    #[error("handler not registered")]
    NotRegistered,
    /// A handler with this name and kind is already registered by this process.
    #[error("handler already registered")]
    Duplicate,
    /// Handler kind (Subcommand/Exit/Function) mismatched the stored record.
    #[error("handler type mismatch")]
    BadType,
    /// Attempted to drop a block this process does not own.
    #[error("caller cannot drop this handler")]
    NoCanDrop,
    /// The backing module could not be loaded.
    #[error("handler module not found")]
    ModuleNotFound,
    /// The module loaded, but the named entry point was not found in it.
    #[error("handler entry point not found")]
    EntryNotFound,
    /// Module or entry point resolution failed for another reason.
    #[error("handler load error")]
    LoadError,
    /// The HandlerPool could not be grown to hold the new block.
    #[error("no memory for handler block")]
    NoMem,
}
