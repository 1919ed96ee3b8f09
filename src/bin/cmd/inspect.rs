// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show trial summary, points, analogs, events, metadata.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::common::{format_duration, format_timestamp, load_trial, print_json, Result};
use mocodec::io::{HandlerRegistry, IoOptions};
use mocodec::{PropertyValue, Trial};

/// Arguments shared by every inspect subcommand.
#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
    /// Input trial file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Force the format instead of detecting it
    #[arg(short, long)]
    format: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Inspect trial contents.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show rates, counts and duration
    Info(InspectArgs),

    /// List points with their kind and valid frames
    Points(InspectArgs),

    /// List analog channels with their conversion and range
    Analogs(InspectArgs),

    /// List events
    Events(InspectArgs),

    /// Dump metadata groups and entries
    Metadata(InspectArgs),
}

impl InspectCmd {
    pub fn run(self, options: &IoOptions) -> Result<()> {
        let registry = HandlerRegistry::with_options(options);
        match self {
            InspectCmd::Info(args) => cmd_info(&registry, &args),
            InspectCmd::Points(args) => cmd_points(&registry, &args),
            InspectCmd::Analogs(args) => cmd_analogs(&registry, &args),
            InspectCmd::Events(args) => cmd_events(&registry, &args),
            InspectCmd::Metadata(args) => cmd_metadata(&registry, &args),
        }
    }
}

fn load(registry: &HandlerRegistry, args: &InspectArgs) -> Result<(&'static str, Trial)> {
    load_trial(registry, &args.input, args.format.as_deref())
}

#[derive(Serialize)]
struct TrialSummary {
    path: String,
    format: &'static str,
    point_rate: f64,
    analog_rate: f64,
    first_frame: u32,
    last_frame: u32,
    frames: usize,
    duration: f64,
    points: usize,
    analogs: usize,
    events: usize,
    metadata_groups: usize,
}

impl TrialSummary {
    fn new(path: &Path, format: &'static str, trial: &Trial) -> Self {
        Self {
            path: path.display().to_string(),
            format,
            point_rate: trial.point_rate(),
            analog_rate: trial.analog_rate(),
            first_frame: trial.first_frame(),
            last_frame: trial.last_frame(),
            frames: trial.frame_count(),
            duration: trial.duration(),
            points: trial.point_count(),
            analogs: trial.analog_count(),
            events: trial.event_count(),
            metadata_groups: trial.metadata().groups().count(),
        }
    }
}

/// Cmd: Show trial summary
fn cmd_info(registry: &HandlerRegistry, args: &InspectArgs) -> Result<()> {
    let (format, trial) = load(registry, args)?;
    let summary = TrialSummary::new(&args.input, format, &trial);
    if args.json {
        return print_json(&summary);
    }

    println!("=== {} ===", summary.path);
    println!("Format: {}", summary.format);
    println!("Point rate: {} Hz", summary.point_rate);
    println!("Analog rate: {} Hz", summary.analog_rate);
    println!(
        "Frames: {} ({}..{})",
        summary.frames, summary.first_frame, summary.last_frame
    );
    println!("Duration: {}", format_duration(summary.duration));
    println!("Points: {}", summary.points);
    println!("Analogs: {}", summary.analogs);
    println!("Events: {}", summary.events);
    println!("Metadata groups: {}", summary.metadata_groups);
    Ok(())
}

#[derive(Serialize)]
struct PointSummary {
    label: String,
    kind: String,
    unit: String,
    description: String,
    valid_frames: usize,
}

/// Cmd: List points
fn cmd_points(registry: &HandlerRegistry, args: &InspectArgs) -> Result<()> {
    let (_, trial) = load(registry, args)?;
    let units = trial.units();
    let points: Vec<PointSummary> = trial
        .points()
        .map(|p| PointSummary {
            label: p.label(),
            kind: p.kind().to_string(),
            unit: units.for_kind(p.kind()).to_string(),
            description: p.description(),
            valid_frames: (0..p.frame_count()).filter(|f| p.is_valid(*f)).count(),
        })
        .collect();
    if args.json {
        return print_json(&points);
    }

    println!("=== Points in {} ===", args.input.display());
    for point in &points {
        println!(
            "  {} | {} [{}] | {}/{} frames valid",
            point.label,
            point.kind,
            point.unit,
            point.valid_frames,
            trial.frame_count()
        );
        if !point.description.is_empty() {
            println!("    {}", point.description);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct AnalogSummary {
    label: String,
    unit: String,
    description: String,
    gain: String,
    scale: f64,
    offset: i32,
    samples: usize,
    min: Option<f64>,
    max: Option<f64>,
}

/// Cmd: List analog channels
fn cmd_analogs(registry: &HandlerRegistry, args: &InspectArgs) -> Result<()> {
    let (_, trial) = load(registry, args)?;
    let analogs: Vec<AnalogSummary> = trial
        .analogs()
        .map(|a| {
            let samples = a.samples();
            let min = samples.iter().copied().reduce(f64::min);
            let max = samples.iter().copied().reduce(f64::max);
            AnalogSummary {
                label: a.label(),
                unit: a.unit(),
                description: a.description(),
                gain: a.gain().to_string(),
                scale: a.scale(),
                offset: a.offset(),
                samples: samples.len(),
                min,
                max,
            }
        })
        .collect();
    if args.json {
        return print_json(&analogs);
    }

    println!(
        "=== Analogs in {} ({} Hz) ===",
        args.input.display(),
        trial.analog_rate()
    );
    for analog in &analogs {
        println!(
            "  {} [{}] | gain {} | scale {} offset {} | {} samples",
            analog.label, analog.unit, analog.gain, analog.scale, analog.offset, analog.samples
        );
        if let (Some(min), Some(max)) = (analog.min, analog.max) {
            println!("    range {min} .. {max}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EventSummary {
    label: String,
    seconds: Option<f64>,
    frame: Option<i32>,
    context: String,
    description: Option<String>,
    subject: Option<String>,
}

/// Cmd: List events
fn cmd_events(registry: &HandlerRegistry, args: &InspectArgs) -> Result<()> {
    let (_, trial) = load(registry, args)?;
    let rate = trial.point_rate();
    let events: Vec<EventSummary> = trial
        .events()
        .map(|e| EventSummary {
            label: e.label(),
            seconds: e.time().seconds(rate),
            frame: e.time().frame(rate),
            context: e.context(),
            description: e.description(),
            subject: e.subject(),
        })
        .collect();
    if args.json {
        return print_json(&events);
    }

    println!("=== Events in {} ===", args.input.display());
    for event in &events {
        let time = match (event.seconds, event.frame) {
            (Some(s), Some(f)) => format!("{s:.3}s (frame {f})"),
            (Some(s), None) => format!("{s:.3}s"),
            (None, Some(f)) => format!("frame {f}"),
            (None, None) => "-".to_string(),
        };
        print!("  {} | {}", event.label, time);
        if !event.context.is_empty() {
            print!(" | {}", event.context);
        }
        if let Some(subject) = &event.subject {
            print!(" | {subject}");
        }
        println!();
    }
    Ok(())
}

#[derive(Serialize)]
struct EntrySummary {
    name: String,
    value: PropertyValue,
    description: String,
    locked: bool,
}

#[derive(Serialize)]
struct GroupSummary {
    name: String,
    description: Option<String>,
    locked: bool,
    entries: Vec<EntrySummary>,
}

fn display_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Timestamp(nanos) => format_timestamp(*nanos),
        other => other.to_string(),
    }
}

/// Cmd: Dump metadata
fn cmd_metadata(registry: &HandlerRegistry, args: &InspectArgs) -> Result<()> {
    let (_, trial) = load(registry, args)?;
    let metadata = trial.metadata();
    let groups: Vec<GroupSummary> = metadata
        .groups()
        .map(|g| {
            let name = g.name();
            GroupSummary {
                description: metadata.group_description(&name),
                locked: metadata.group_locked(&name),
                entries: metadata
                    .entries(&name)
                    .into_iter()
                    .map(|(entry_name, entry)| EntrySummary {
                        name: entry_name,
                        value: entry.value,
                        description: entry.description,
                        locked: entry.locked,
                    })
                    .collect(),
                name,
            }
        })
        .collect();
    if args.json {
        return print_json(&groups);
    }

    println!("=== Metadata in {} ===", args.input.display());
    for group in &groups {
        let lock = if group.locked { " (locked)" } else { "" };
        match &group.description {
            Some(description) => println!("{}{lock} - {description}", group.name),
            None => println!("{}{lock}", group.name),
        }
        for entry in &group.entries {
            println!("  {} = {}", entry.name, display_value(&entry.value));
        }
    }
    Ok(())
}
