// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Read-only diagnostic over the live rexxipc registry, standing in for
//! the out-of-scope `rxdelipc` operator tool.

use std::process::ExitCode;

use rexxipc::anchor::Registry;
use rexxipc::records::{HandlerBlockRaw, QueueHeaderRaw, read_at};
use rexxipc::segment::NO_MORE;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let registry = match Registry::attach() {
        Ok(r) => r,
        Err(_) => {
            eprintln!("ipc-doctor: failed to attach to the rexxipc registry");
            return ExitCode::from(255);
        }
    };

    let header = registry.header();

    println!("macro pool:   {} bytes ({} used)", registry.macro_pool.size(), registry.macro_pool.top());
    println!(
        "handler pool: {} bytes ({} used)",
        registry.handler_pool.size(),
        registry.handler_pool.top()
    );
    println!(
        "queue pool:   {} bytes ({} used of {} top)",
        registry.queue_pool.size(),
        registry.queue_pool.used_bytes,
        registry.queue_pool.top()
    );

    let mut queue_count = 0usize;
    let mut cursor = header.queue_chain;
    while cursor != NO_MORE {
        let q: QueueHeaderRaw = unsafe { read_at(registry.queue_pool.bytes(), cursor) };
        queue_count += 1;
        cursor = q.next;
    }
    println!("queues registered: {queue_count}");

    let mut macro_count = 0usize;
    let mut cursor = header.macro_chain;
    while cursor != NO_MORE {
        let m: rexxipc::records::MacroHeaderRaw = unsafe { read_at(registry.macro_pool.bytes(), cursor) };
        macro_count += 1;
        cursor = m.next;
    }
    println!("macros registered: {macro_count}");

    for (label, chain_head) in [
        ("subcommand", header.handler_chains[0]),
        ("exit", header.handler_chains[1]),
        ("function", header.handler_chains[2]),
    ] {
        let mut count = 0usize;
        let mut cursor = chain_head;
        while cursor != NO_MORE {
            let h: HandlerBlockRaw = unsafe { read_at(registry.handler_pool.bytes(), cursor) };
            count += 1;
            cursor = h.next;
        }
        println!("{label} handlers registered: {count}");
    }

    ExitCode::SUCCESS
}
