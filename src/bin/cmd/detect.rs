// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Detect command - identify the format of files from their content.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Args;
use serde::Serialize;

use crate::common::{print_json, Result};
use mocodec::device::{FileDevice, OpenMode};
use mocodec::io::{HandlerRegistry, IoOptions, ProbeOutcome};

/// Detect the format of files.
#[derive(Args, Clone, Debug)]
pub struct DetectCmd {
    /// Files to identify
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Detection {
    path: String,
    format: Option<&'static str>,
    /// Leading bytes, hex encoded, when nothing matched
    sampled: Option<String>,
    error: Option<String>,
}

impl DetectCmd {
    pub fn run(self, options: &IoOptions) -> Result<()> {
        let registry = HandlerRegistry::with_options(options);
        let detections: Vec<Detection> = self
            .inputs
            .iter()
            .map(|input| {
                let mut detection = Detection {
                    path: input.display().to_string(),
                    format: None,
                    sampled: None,
                    error: None,
                };
                match FileDevice::open(input, OpenMode::Read) {
                    Ok(mut device) => match registry.probe(&mut device) {
                        ProbeOutcome::Matched(handler) => detection.format = Some(handler.name()),
                        ProbeOutcome::NoMatch { sampled } => {
                            detection.sampled = Some(hex::encode(sampled))
                        }
                    },
                    Err(err) => detection.error = Some(err.to_string()),
                }
                detection
            })
            .collect();

        if self.json {
            print_json(&detections)?;
        } else {
            for detection in &detections {
                match (&detection.format, &detection.sampled, &detection.error) {
                    (Some(format), ..) => println!("{}: {format}", detection.path),
                    (None, Some(sampled), _) => {
                        println!("{}: unknown (starts with {sampled})", detection.path)
                    }
                    (None, None, Some(error)) => println!("{}: error: {error}", detection.path),
                    (None, None, None) => println!("{}: unknown", detection.path),
                }
            }
        }

        let unknown = detections.iter().filter(|d| d.format.is_none()).count();
        if unknown > 0 {
            return Err(anyhow!("{unknown} of {} files not recognised", detections.len()));
        }
        Ok(())
    }
}
