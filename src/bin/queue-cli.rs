// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Demo shell over the queue registry, standing in for the out-of-scope
//! `rxqueue` tool.

use std::io::{Read, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rexxipc::anchor::Registry;
use rexxipc::error::QueueError;
use rexxipc::queue::{self, Priority, Wait};

#[derive(Parser)]
#[command(name = "queue-cli", about = "Inspect and drive rexxipc named queues")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a named queue (omit the name for a synthetic session queue).
    Create { name: Option<String> },
    /// Deletes a named queue.
    Delete { name: String },
    /// Reports the item count of a named queue (`SESSION` for the caller's
    /// own session queue, created on first query).
    Query { name: String },
    /// Pushes a line read from stdin onto a queue.
    Push {
        name: String,
        #[arg(long)]
        lifo: bool,
    },
    /// Pulls one item off a queue and writes it to stdout.
    Pull {
        name: String,
        #[arg(long)]
        wait: bool,
    },
}

fn queue_error_exit_code(err: QueueError) -> u8 {
    10 + err as u8
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut registry = match Registry::attach() {
        Ok(r) => r,
        Err(_) => {
            eprintln!("queue-cli: failed to attach to the rexxipc registry");
            return ExitCode::from(255);
        }
    };

    match cli.command {
        Command::Create { name } => match queue::create(&mut registry, name.as_deref()) {
            Ok(created) => {
                println!("{created}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("queue-cli: create failed: {e}");
                ExitCode::from(queue_error_exit_code(e))
            }
        },
        Command::Delete { name } => match queue::delete(&mut registry, &name) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("queue-cli: delete failed: {e}");
                ExitCode::from(queue_error_exit_code(e))
            }
        },
        Command::Query { name } => match queue::query(&mut registry, &name) {
            Ok(count) => {
                println!("{count}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("queue-cli: query failed: {e}");
                ExitCode::from(queue_error_exit_code(e))
            }
        },
        Command::Push { name, lifo } => {
            let mut payload = String::new();
            if std::io::stdin().read_to_string(&mut payload).is_err() {
                eprintln!("queue-cli: failed to read payload from stdin");
                return ExitCode::from(255);
            }
            let priority = if lifo { Priority::Lifo } else { Priority::Fifo };
            match queue::push(&mut registry, &name, payload.as_bytes(), priority) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("queue-cli: push failed: {e}");
                    ExitCode::from(queue_error_exit_code(e))
                }
            }
        }
        Command::Pull { name, wait } => {
            let wait = if wait { Wait::Wait } else { Wait::NoWait };
            match queue::pull(&mut registry, &name, wait) {
                Ok(data) => {
                    let _ = std::io::stdout().write_all(&data);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("queue-cli: pull failed: {e}");
                    ExitCode::from(queue_error_exit_code(e))
                }
            }
        }
    }
}
