// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Convert command - convert single files or batches between formats.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use clap::{Args, Subcommand};
use rayon::prelude::*;

use crate::common::{load_trial, ProgressBar, Result};
use mocodec::io::{HandlerRegistry, IoOptions, TrialHandler, WriterBuilder};
use mocodec::Trial;

/// Content selection applied before writing.
#[derive(Args, Clone, Debug, Default)]
pub struct Selection {
    /// Drop analog channels (e.g. for TRC output)
    #[arg(long, conflicts_with = "analogs_only")]
    points_only: bool,

    /// Drop points (e.g. for ANC output)
    #[arg(long)]
    analogs_only: bool,

    /// Keep the output file when encoding fails
    #[arg(long)]
    keep_incomplete: bool,
}

impl Selection {
    fn apply(&self, trial: &Trial) {
        if self.points_only {
            for analog in trial.analogs().collect::<Vec<_>>() {
                trial.remove_analog(&analog.label());
            }
        }
        if self.analogs_only {
            for point in trial.points().collect::<Vec<_>>() {
                trial.remove_point(&point.label());
            }
        }
    }
}

/// Convert between formats.
#[derive(Subcommand, Clone, Debug)]
pub enum ConvertCmd {
    /// Convert one file; the output format follows the output extension
    File {
        /// Input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Force the input format
        #[arg(long)]
        from: Option<String>,

        /// Force the output format
        #[arg(long)]
        to: Option<String>,

        #[command(flatten)]
        selection: Selection,
    },

    /// Convert many files in parallel into one directory
    Batch {
        /// Input files
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(long)]
        to: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output_dir: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },
}

impl ConvertCmd {
    pub fn run(self, options: &IoOptions) -> Result<()> {
        let registry = HandlerRegistry::with_options(options);
        match self {
            ConvertCmd::File {
                input,
                output,
                from,
                to,
                selection,
            } => cmd_file(&registry, options, &input, &output, from, to, &selection),
            ConvertCmd::Batch {
                inputs,
                to,
                output_dir,
                selection,
            } => cmd_batch(&registry, options, inputs, &to, &output_dir, &selection),
        }
    }
}

fn target_handler<'a>(
    registry: &'a HandlerRegistry,
    output: &Path,
    to: Option<&str>,
) -> Result<&'a dyn TrialHandler> {
    let key = match to {
        Some(format) => format.to_string(),
        None => output
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot tell the output format of {}", output.display()))?,
    };
    registry
        .handler(&key)
        .ok_or_else(|| anyhow!("Unknown output format '{key}'"))
}

/// Read, select and write one trial.
fn convert(
    registry: &HandlerRegistry,
    options: &IoOptions,
    input: &Path,
    output: &Path,
    from: Option<&str>,
    target: &dyn TrialHandler,
    selection: &Selection,
) -> Result<()> {
    let (_, trial) = load_trial(registry, input, from)?;
    selection.apply(&trial);
    WriterBuilder::new()
        .path(output)
        .format(target.name())
        .options(options.clone())
        .keep_incomplete(selection.keep_incomplete)
        .write(&trial)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn report_discarded(target: &dyn TrialHandler) {
    let discarded = target.discarded_fields();
    if !discarded.is_empty() {
        let names: Vec<String> = discarded.iter().map(|f| f.to_string()).collect();
        eprintln!("Note: {} does not carry {}", target.name(), names.join(", "));
    }
}

/// Convert one file.
fn cmd_file(
    registry: &HandlerRegistry,
    options: &IoOptions,
    input: &Path,
    output: &Path,
    from: Option<String>,
    to: Option<String>,
    selection: &Selection,
) -> Result<()> {
    let target = target_handler(registry, output, to.as_deref())?;
    println!("Converting:");
    println!("  Input:  {}", input.display());
    println!("  Output: {} ({})", output.display(), target.name());

    convert(
        registry,
        options,
        input,
        output,
        from.as_deref(),
        target,
        selection,
    )?;
    report_discarded(target);
    println!("  Conversion complete!");
    Ok(())
}

/// Output path for `input` in `dir` with the target's first extension.
fn batch_output(input: &Path, dir: &Path, target: &dyn TrialHandler) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trial".to_string());
    let extension = target
        .supported_extensions()
        .first()
        .copied()
        .unwrap_or("out");
    dir.join(format!("{stem}.{extension}"))
}

/// Convert many files in parallel.
fn cmd_batch(
    registry: &HandlerRegistry,
    options: &IoOptions,
    inputs: Vec<PathBuf>,
    to: &str,
    output_dir: &Path,
    selection: &Selection,
) -> Result<()> {
    let target = target_handler(registry, output_dir, Some(to))?;
    if !target.capability().can_write() {
        return Err(anyhow!("Format {} cannot be written", target.name()));
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let progress = ProgressBar::new(inputs.len() as u64, "Converting");
    let failures: Vec<(PathBuf, anyhow::Error)> = inputs
        .par_iter()
        .filter_map(|input| {
            let output = batch_output(input, output_dir, target);
            let result = convert(registry, options, input, &output, None, target, selection);
            progress.inc();
            result.err().map(|e| (input.clone(), e))
        })
        .collect();

    let converted = inputs.len() - failures.len();
    progress.finish_with_message(format!("{converted} converted"));
    for (input, err) in &failures {
        eprintln!("  {}: {err:#}", input.display());
    }
    println!(
        "Converted {converted}/{} files to {} in {}",
        inputs.len(),
        target.name(),
        output_dir.display()
    );
    report_discarded(target);

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} conversions failed",
            failures.len(),
            inputs.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_output_uses_target_extension() {
        let registry = HandlerRegistry::builtin();
        let target = registry.handler("TRC").unwrap();
        assert_eq!(
            batch_output(Path::new("data/walk01.c3d"), Path::new("out"), target),
            PathBuf::from("out/walk01.trc")
        );
    }

    #[test]
    fn test_target_from_extension() {
        let registry = HandlerRegistry::builtin();
        let target = target_handler(&registry, Path::new("walk.ANC"), None).unwrap();
        assert_eq!(target.name(), "ANC");
        assert!(target_handler(&registry, Path::new("walk"), None).is_err());
        assert!(target_handler(&registry, Path::new("walk.c3d"), Some("mcap")).is_err());
    }
}
