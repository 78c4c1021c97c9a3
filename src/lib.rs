// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Thin top-level wiring over the two independent cores: [`rexxhash`]'s
//! hash-based collection engine and [`rexxipc`]'s cross-process registry.
//! The demo binaries under `src/bin/` are the only consumers of this
//! crate as a library; most callers should depend on `rexxhash` and
//! `rexxipc` directly.

pub use rexxhash;
pub use rexxipc;
