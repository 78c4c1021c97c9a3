// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Macro-space registry: name → tokenized image, plus the on-disk
//! save/load file format (§4.6, §6).
//!
//! File layout: a 12-byte version tag, a 4-byte signature, a 4-byte item
//! count, then `count` macro headers copied verbatim, then each image's
//! bytes in the same order. `Load` stages everything into a
//! [`LoadTransaction`] and only touches the live pool once every
//! requested name has been validated, so a rejected load leaves the
//! in-memory registry untouched (§1.2 supplement).

use std::io::{Read, Seek, Write};

use crate::anchor::Registry;
use crate::error::MacroError;
use crate::records::{FixedName, MacroHeaderRaw, MacroPosition, read_at, write_at};
use crate::segment::NO_MORE;

const VERSION_TAG: [u8; 12] = *b"REXXSAA 4.00";
const SIGNATURE: u32 = 0xDDD5;

const HEADER_SIZE: usize = std::mem::size_of::<MacroHeaderRaw>();

fn find_macro(registry: &Registry, wanted: &str) -> Option<usize> {
    let mut cursor = registry.header().macro_chain;
    let bytes = registry.macro_pool.bytes();
    while cursor != NO_MORE {
        let header: MacroHeaderRaw = unsafe { read_at(bytes, cursor) };
        if header.name.matches(wanted) {
            return Some(cursor);
        }
        cursor = header.next;
    }
    None
}

fn position_from_flag(flag: u8) -> Result<MacroPosition, MacroError> {
    match flag {
        1 => Ok(MacroPosition::SearchBefore),
        2 => Ok(MacroPosition::SearchAfter),
        _ => Err(MacroError::InvalidPosition),
    }
}

/// Registers `image` under `name`, replacing any existing image in place.
pub fn add(
    registry: &mut Registry,
    name: &str,
    image: &[u8],
    position: MacroPosition,
) -> Result<(), MacroError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        if let Some(offset) = find_macro(registry, &upper) {
            let mut header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
            let image_offset = registry
                .macro_pool
                .bump(image.len())
                .map_err(|_| MacroError::NoStorage)?;
            registry.macro_pool.bytes_mut()[image_offset..image_offset + image.len()]
                .copy_from_slice(image);
            header.image_offset = image_offset;
            header.image_size = image.len();
            header.position = position;
            unsafe { write_at(registry.macro_pool.bytes_mut(), offset, header) };
            return Ok(());
        }

        let image_offset = registry
            .macro_pool
            .bump(image.len())
            .map_err(|_| MacroError::NoStorage)?;
        registry.macro_pool.bytes_mut()[image_offset..image_offset + image.len()]
            .copy_from_slice(image);
        let offset = registry
            .macro_pool
            .bump(HEADER_SIZE)
            .map_err(|_| MacroError::NoStorage)?;
        let mut anchor = registry.header();
        let header = MacroHeaderRaw {
            next: anchor.macro_chain,
            name: FixedName::from_str_uppercased(&upper),
            image_offset,
            image_size: image.len(),
            position,
        };
        unsafe { write_at(registry.macro_pool.bytes_mut(), offset, header) };
        anchor.macro_chain = offset;
        registry.set_header(anchor);
        Ok(())
    })
}

/// Removes a macro's registration and image.
pub fn drop_macro(registry: &mut Registry, name: &str) -> Result<(), MacroError> {
    registry.with_lock(|registry| {
        let upper = name.to_ascii_uppercase();
        let offset = find_macro(registry, &upper).ok_or(MacroError::NotFound)?;
        let mut anchor = registry.header();
        if anchor.macro_chain == offset {
            let header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
            anchor.macro_chain = header.next;
        } else {
            let mut cursor = anchor.macro_chain;
            while cursor != NO_MORE {
                let mut header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), cursor) };
                if header.next == offset {
                    let target: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
                    header.next = target.next;
                    unsafe { write_at(registry.macro_pool.bytes_mut(), cursor, header) };
                    break;
                }
                cursor = header.next;
            }
        }
        registry.set_header(anchor);
        Ok(())
    })
}

/// Releases the whole macro pool (§4.6 "Clear"): the segment is discarded
/// and replaced with a fresh, empty one of standard size.
pub fn clear(registry: &mut Registry) -> Result<(), MacroError> {
    registry.with_lock(|registry| {
        registry.macro_pool.mark_segment_for_removal();
        registry.macro_pool = crate::segment::Pool::create(crate::segment::PoolKind::Macro)
            .map_err(|_| MacroError::NoStorage)?;
        let mut anchor = registry.header();
        anchor.macro_chain = NO_MORE;
        registry.set_header(anchor);
        Ok(())
    })
}

/// Returns the position flag of a registered macro, if present.
#[must_use]
pub fn query(registry: &Registry, name: &str) -> Option<MacroPosition> {
    let offset = find_macro(registry, &name.to_ascii_uppercase())?;
    let header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
    Some(header.position)
}

/// Changes a registered macro's search position.
pub fn reorder(registry: &mut Registry, name: &str, position: MacroPosition) -> Result<(), MacroError> {
    registry.with_lock(|registry| {
        let offset = find_macro(registry, &name.to_ascii_uppercase()).ok_or(MacroError::NotFound)?;
        let mut header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
        header.position = position;
        unsafe { write_at(registry.macro_pool.bytes_mut(), offset, header) };
        Ok(())
    })
}

/// Returns a copy of a macro's tokenized image.
pub fn execute(registry: &Registry, name: &str) -> Result<Vec<u8>, MacroError> {
    let offset = find_macro(registry, &name.to_ascii_uppercase()).ok_or(MacroError::NotFound)?;
    let header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), offset) };
    Ok(registry.macro_pool.bytes()[header.image_offset..header.image_offset + header.image_size].to_vec())
}

/// Writes every registered macro (or only `names`, if given) to `path`.
/// Any write failure removes the partially written file (§6 "Save").
pub fn save(registry: &Registry, names: Option<&[&str]>, path: &std::path::Path) -> Result<(), MacroError> {
    match save_inner(registry, names, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(path);
            Err(e)
        }
    }
}

fn save_inner(registry: &Registry, names: Option<&[&str]>, path: &std::path::Path) -> Result<(), MacroError> {
    let wanted: Option<Vec<String>> = names.map(|n| n.iter().map(|s| s.to_ascii_uppercase()).collect());

    let mut selected = Vec::new();
    let mut cursor = registry.header().macro_chain;
    while cursor != NO_MORE {
        let header: MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), cursor) };
        let include = wanted.as_ref().is_none_or(|list| list.iter().any(|n| header.name.matches(n)));
        if include {
            selected.push(header);
        }
        cursor = header.next;
    }

    let mut file = std::fs::File::create(path).map_err(|_| MacroError::FileError)?;
    file.write_all(&VERSION_TAG).map_err(|_| MacroError::FileError)?;
    file.write_all(&SIGNATURE.to_le_bytes()).map_err(|_| MacroError::FileError)?;
    file.write_all(&(selected.len() as u32).to_le_bytes())
        .map_err(|_| MacroError::FileError)?;
    for header in &selected {
        let raw = unsafe {
            std::slice::from_raw_parts((header as *const MacroHeaderRaw).cast::<u8>(), HEADER_SIZE)
        };
        file.write_all(raw).map_err(|_| MacroError::FileError)?;
        // §9.1 decision (ii): append this writer's header layout width so a
        // reader built against a different platform word size can detect a
        // mismatch instead of silently misinterpreting the header array.
        file.write_all(&(HEADER_SIZE as u32).to_le_bytes())
            .map_err(|_| MacroError::FileError)?;
    }
    for header in &selected {
        let image = &registry.macro_pool.bytes()[header.image_offset..header.image_offset + header.image_size];
        file.write_all(image).map_err(|_| MacroError::FileError)?;
    }
    Ok(())
}

/// Stages a load from file without mutating the live registry until every
/// requested name has been validated against both the file contents and
/// the current registrations (§1.2).
pub struct LoadTransaction {
    headers: Vec<MacroHeaderRaw>,
    images: Vec<Vec<u8>>,
}

impl LoadTransaction {
    /// Reads and validates `path`, staging the requested macros (or all of
    /// them, if `names` is absent) into memory without touching the
    /// registry. Discards the staged buffer and returns an error if any
    /// requested name is missing from the file or already registered.
    pub fn stage(registry: &Registry, names: Option<&[&str]>, path: &std::path::Path) -> Result<Self, MacroError> {
        let mut file = std::fs::File::open(path).map_err(|_| MacroError::FileError)?;

        let mut version = [0u8; 12];
        file.read_exact(&mut version).map_err(|_| MacroError::FileError)?;
        if version != VERSION_TAG {
            return Err(MacroError::SignatureError);
        }
        let mut sig_buf = [0u8; 4];
        file.read_exact(&mut sig_buf).map_err(|_| MacroError::FileError)?;
        if u32::from_le_bytes(sig_buf) != SIGNATURE {
            return Err(MacroError::SignatureError);
        }
        let mut count_buf = [0u8; 4];
        file.read_exact(&mut count_buf).map_err(|_| MacroError::FileError)?;
        let count = u32::from_le_bytes(count_buf) as usize;

        let mut all_headers = Vec::with_capacity(count);
        for _ in 0..count {
            let mut raw = vec![0u8; HEADER_SIZE];
            file.read_exact(&mut raw).map_err(|_| MacroError::FileError)?;
            let mut width_buf = [0u8; 4];
            file.read_exact(&mut width_buf).map_err(|_| MacroError::FileError)?;
            if u32::from_le_bytes(width_buf) as usize != HEADER_SIZE {
                return Err(MacroError::SignatureError);
            }
            // SAFETY: `raw` holds exactly `HEADER_SIZE` freshly read bytes,
            // copied out before the buffer is reused.
            let header = unsafe { raw.as_ptr().cast::<MacroHeaderRaw>().read_unaligned() };
            all_headers.push(header);
        }

        let wanted: Option<Vec<String>> = names.map(|n| n.iter().map(|s| s.to_ascii_uppercase()).collect());
        if let Some(list) = &wanted {
            for name in list {
                if !all_headers.iter().any(|h| h.name.matches(name)) {
                    return Err(MacroError::SourceNotFound);
                }
                if find_macro(registry, name).is_some() {
                    return Err(MacroError::AlreadyExists);
                }
            }
        } else {
            for header in &all_headers {
                if find_macro(registry, header.name.as_str()).is_some() {
                    return Err(MacroError::AlreadyExists);
                }
            }
        }

        let mut headers = Vec::new();
        let mut images = Vec::new();
        for header in &all_headers {
            let include = wanted.as_ref().is_none_or(|list| list.iter().any(|n| header.name.matches(n)));
            if !include {
                file.seek_relative(header.image_size as i64)
                    .map_err(|_| MacroError::FileError)?;
                continue;
            }
            let mut image = vec![0u8; header.image_size];
            file.read_exact(&mut image).map_err(|_| MacroError::FileError)?;
            headers.push(*header);
            images.push(image);
        }

        Ok(Self { headers, images })
    }

    /// Commits the staged macros into the live registry. Each macro is
    /// added under its own `apiSem` acquisition, matching `add`'s own
    /// locking; `stage` already validated every name, so none of these
    /// calls can fail on `AlreadyExists`.
    pub fn commit(self, registry: &mut Registry) -> Result<usize, MacroError> {
        let mut committed = 0;
        for (header, image) in self.headers.iter().zip(self.images.iter()) {
            let position = position_from_flag(header.position as u8).unwrap_or(MacroPosition::SearchAfter);
            add(registry, header.name.as_str(), image, position)?;
            committed += 1;
        }
        Ok(committed)
    }
}

/// Reads `path` and registers the macros it contains (§6 "Load").
pub fn load(registry: &mut Registry, names: Option<&[&str]>, path: &std::path::Path) -> Result<usize, MacroError> {
    let transaction = LoadTransaction::stage(registry, names, path)?;
    transaction.commit(registry)
}

#[cfg(test)]
mod macros_test;
