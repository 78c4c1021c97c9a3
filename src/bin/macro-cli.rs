// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Rexxcore Project

//! Demo shell over the macro registry, standing in for the out-of-scope
//! `rxsubcom`-adjacent macro-space tooling.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use rexxipc::anchor::Registry;
use rexxipc::error::MacroError;
use rexxipc::macros::{self, LoadTransaction};
use rexxipc::records::MacroPosition;

#[derive(Parser)]
#[command(name = "macro-cli", about = "Inspect and drive the rexxipc macro space")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    Before,
    After,
}

impl From<PositionArg> for MacroPosition {
    fn from(value: PositionArg) -> Self {
        match value {
            PositionArg::Before => Self::SearchBefore,
            PositionArg::After => Self::SearchAfter,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Registers a macro, reading its image bytes from `file`.
    Add {
        name: String,
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = PositionArg::After)]
        position: PositionArg,
    },
    /// Removes a macro's registration and image.
    Drop { name: String },
    /// Prints a macro's registered search position.
    Query { name: String },
    /// Changes a macro's registered search position.
    Reorder {
        name: String,
        #[arg(value_enum)]
        position: PositionArg,
    },
    /// Saves every registered macro (or only `name`, if given) to `file`.
    Save { file: PathBuf, name: Option<String> },
    /// Loads macros from `file` into the registry.
    Load { file: PathBuf, name: Option<String> },
}

fn macro_error_exit_code(err: MacroError) -> u8 {
    10 + err as u8
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut registry = match Registry::attach() {
        Ok(r) => r,
        Err(_) => {
            eprintln!("macro-cli: failed to attach to the rexxipc registry");
            return ExitCode::from(255);
        }
    };

    match cli.command {
        Command::Add { name, file, position } => {
            let image = match std::fs::read(&file) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("macro-cli: failed to read {}: {e}", file.display());
                    return ExitCode::from(255);
                }
            };
            match macros::add(&mut registry, &name, &image, position.into()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("macro-cli: add failed: {e}");
                    ExitCode::from(macro_error_exit_code(e))
                }
            }
        }
        Command::Drop { name } => match macros::drop_macro(&mut registry, &name) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("macro-cli: drop failed: {e}");
                ExitCode::from(macro_error_exit_code(e))
            }
        },
        Command::Query { name } => match macros::query(&registry, &name) {
            Some(MacroPosition::SearchBefore) => {
                println!("before");
                ExitCode::SUCCESS
            }
            Some(MacroPosition::SearchAfter) => {
                println!("after");
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("macro-cli: no such macro");
                ExitCode::from(macro_error_exit_code(MacroError::NotFound))
            }
        },
        Command::Reorder { name, position } => {
            match macros::reorder(&mut registry, &name, position.into()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("macro-cli: reorder failed: {e}");
                    ExitCode::from(macro_error_exit_code(e))
                }
            }
        }
        Command::Save { file, name } => {
            let names: Option<Vec<&str>> = name.as_deref().map(|n| vec![n]);
            match macros::save(&registry, names.as_deref(), &file) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("macro-cli: save failed: {e}");
                    ExitCode::from(macro_error_exit_code(e))
                }
            }
        }
        Command::Load { file, name } => {
            let names: Option<Vec<&str>> = name.as_deref().map(|n| vec![n]);
            let result = LoadTransaction::stage(&registry, names.as_deref(), &file)
                .and_then(|txn| txn.commit(&mut registry));
            match result {
                Ok(count) => {
                    println!("loaded {count} macro(s)");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("macro-cli: load failed: {e}");
                    ExitCode::from(macro_error_exit_code(e))
                }
            }
        }
    }
}
