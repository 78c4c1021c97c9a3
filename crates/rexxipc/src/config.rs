// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Environment resolution for the IPC anchor.
//!
//! The anchor file's location is derived once, the way `lona-memory-manager`'s
//! `platform` module centralized its own environment-specific setup behind a
//! single entry point: everyone who needs `RXHOME` calls [`anchor_path`]
//! rather than re-deriving it.

use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::error::SegmentError;

/// Filename of the anchor file, tagged with the on-disk registry layout
/// version so an incompatible future version never attaches to this one.
const ANCHOR_FILE_NAME: &str = ".rexxipc_anchor_v1";

/// Resolves the directory used to key the IPC anchor: `RXHOME`, falling
/// back to `HOME`, falling back to `/tmp` (§6).
#[must_use]
pub fn anchor_dir() -> PathBuf {
    if let Ok(rxhome) = std::env::var("RXHOME") {
        if !rxhome.is_empty() {
            return PathBuf::from(rxhome);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    PathBuf::from("/tmp")
}

/// Full path to the anchor file.
#[must_use]
pub fn anchor_path() -> PathBuf {
    anchor_dir().join(ANCHOR_FILE_NAME)
}

/// Ensures the anchor file exists and is read+write accessible, creating it
/// if necessary. Returns [`SegmentError::PermissionDenied`] if it exists
/// but cannot be opened for read+write.
pub fn ensure_anchor_file() -> Result<PathBuf, SegmentError> {
    let path = anchor_path();
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|_| SegmentError::PermissionDenied)?;
    Ok(path)
}

/// Derives a System V IPC key from the anchor file path and a small
/// per-pool id, via `ftok`.
pub fn ipc_key(path: &std::path::Path, proj_id: u8) -> Result<libc::key_t, SegmentError> {
    let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| SegmentError::PermissionDenied)?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of
    // this call; `ftok` only reads it and the file's metadata.
    let key = unsafe { libc::ftok(c_path.as_ptr(), i32::from(proj_id)) };
    if key == -1 {
        return Err(SegmentError::PermissionDenied);
    }
    Ok(key)
}

#[cfg(test)]
mod config_test;
