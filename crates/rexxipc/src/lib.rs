// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! # rexxipc
//!
//! Cross-process shared-memory registry: named/session queues, a
//! tokenized-macro store, and a subcommand/exit/function handler table,
//! all reachable by any process that attaches to the same [`anchor`].
//!
//! Every public operation acquires the registry-wide mutex semaphore for
//! the duration of its mutation (see [`anchor::Registry::with_lock`]);
//! callers never hold it across a suspension point except inside
//! [`queue::pull`]'s `Wait` path.

pub mod anchor;
pub mod config;
pub mod error;
pub mod handlers;
pub mod macros;
pub mod process;
pub mod records;
pub mod segment;
pub mod semaphore;
pub mod queue;

/// Crate version.
pub const VERSION: &str = match option_env!("REXXIPC_VERSION") {
    Some(v) => v,
    None => "unknown",
};
