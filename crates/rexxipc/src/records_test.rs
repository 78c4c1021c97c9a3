// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

use super::*;

#[test]
fn fixed_name_uppercases_and_truncates() {
    let name = FixedName::from_str_uppercased("my.queue");
    assert_eq!(name.as_str(), "MY.QUEUE");

    let long = "a".repeat(NAME_MAX + 10);
    let truncated = FixedName::from_str_uppercased(&long);
    assert_eq!(truncated.as_str().len(), NAME_MAX);
}

#[test]
fn fixed_name_matches_compares_against_uppercased_str() {
    let name = FixedName::from_str_uppercased("session");
    assert!(name.matches("SESSION"));
    assert!(!name.matches("session"));
}

#[test]
fn handler_block_free_master_detection() {
    let mut block = HandlerBlockRaw {
        next: NO_MORE,
        name: FixedName::EMPTY,
        module_name: FixedName::EMPTY,
        procedure_name: FixedName::EMPTY,
        entry_address: 0,
        module_handle: 0,
        user_area: [0; 8],
        drop_authority: false,
        owner_pid: 0,
        session_pid: 0,
        is_copy: false,
        kind: HandlerKind::Subcommand,
    };
    assert!(block.is_free_master());
    block.owner_pid = 42;
    block.entry_address = 0x1000;
    assert!(!block.is_free_master());
}

#[test]
fn read_write_round_trip_through_raw_bytes() {
    let mut buf = vec![0u8; 256];
    let header = QueueHeaderRaw {
        name: FixedName::from_str_uppercased("WORK"),
        item_count: 3,
        ..QueueHeaderRaw::EMPTY
    };
    unsafe {
        write_at(&mut buf, 16, header);
    }
    let back: QueueHeaderRaw = unsafe { read_at(&buf, 16) };
    assert_eq!(back.item_count, 3);
    assert_eq!(back.name.as_str(), "WORK");
}
