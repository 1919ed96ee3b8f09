// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # mocodec CLI
//!
//! Command-line tool for motion-capture trial files.
//!
//! ## Usage
//!
//! ```sh
//! # Show trial summary
//! mocodec inspect info walk.c3d
//!
//! # List markers as JSON
//! mocodec inspect points walk.c3d --json
//!
//! # Convert formats
//! mocodec convert file walk.c3d walk.trc --points-only
//!
//! # Convert many files in parallel
//! mocodec convert batch --to c3d --output-dir out/ *.trc
//!
//! # Identify files
//! mocodec detect walk.c3d unknown.dat
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cmd::{ConvertCmd, DetectCmd, FormatsCmd, InspectCmd};
use common::{load_options, Result};

/// mocodec - Motion-capture trial toolkit
///
/// Read, inspect and convert C3D, TRC, ANC and Qualisys TSV recordings.
/// Formats are detected from the file content.
#[derive(Parser, Clone)]
#[command(name = "mocodec")]
#[command(about = "Motion-capture trial toolkit for C3D, TRC, ANC and TSV files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Handler options (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Inspect trial contents (info, points, analogs, events, metadata)
    #[command(subcommand)]
    Inspect(InspectCmd),

    /// Convert between formats (single file or batch)
    #[command(subcommand)]
    Convert(ConvertCmd),

    /// Detect the format of files
    Detect(DetectCmd),

    /// List supported formats
    Formats(FormatsCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect(cmd) => cmd.run(&options),
        Commands::Convert(cmd) => cmd.run(&options),
        Commands::Detect(cmd) => cmd.run(&options),
        Commands::Formats(cmd) => cmd.run(&options),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
