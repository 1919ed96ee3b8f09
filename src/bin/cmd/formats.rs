// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Formats command - list the registered handlers.

use clap::Args;
use serde::Serialize;

use crate::common::{print_json, Result};
use mocodec::io::{HandlerRegistry, IoOptions};
use mocodec::TrialField;

/// List supported formats.
#[derive(Args, Clone, Debug)]
pub struct FormatsCmd {
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FormatSummary {
    name: &'static str,
    description: &'static str,
    read: bool,
    write: bool,
    extensions: &'static [&'static str],
    discarded: &'static [TrialField],
}

impl FormatsCmd {
    pub fn run(self, options: &IoOptions) -> Result<()> {
        let registry = HandlerRegistry::with_options(options);
        let formats: Vec<FormatSummary> = registry
            .handlers()
            .map(|h| FormatSummary {
                name: h.name(),
                description: h.description(),
                read: h.capability().can_read(),
                write: h.capability().can_write(),
                extensions: h.supported_extensions(),
                discarded: h.discarded_fields(),
            })
            .collect();
        if self.json {
            return print_json(&formats);
        }

        println!("=== Formats (in probing order) ===");
        for format in &formats {
            let mode = match (format.read, format.write) {
                (true, true) => "read/write",
                (true, false) => "read",
                (false, true) => "write",
                (false, false) => "none",
            };
            println!(
                "  {:<4} {:<10} .{:<8} {}",
                format.name,
                mode,
                format.extensions.join(", ."),
                format.description
            );
        }
        Ok(())
    }
}
